use dapwire_frame::FrameError;
use dapwire_schema::SchemaError;
use dapwire_transport::TransportError;

/// Errors raised by the channel layer.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Framing or stream failure underneath the channel.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Stream setup or teardown failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A payload failed its declared schema.
    #[error("schema violation: {0}")]
    Schema(#[from] SchemaError),

    /// An incoming frame carried JSON that is not a valid message envelope.
    #[error("invalid message: {reason}")]
    InvalidMessage { reason: String },

    /// The channel has been closed; no further messages can be sent.
    #[error("channel closed")]
    Closed,

    /// A second answer was attempted for a request already answered.
    #[error("request {request_seq} already answered")]
    AlreadyAnswered { request_seq: u64 },

    /// The peer answered a request with a failure response.
    #[error("request {command:?} failed: {message}")]
    RequestFailed { command: String, message: String },
}

pub type Result<T> = std::result::Result<T, ChannelError>;
