/// Errors that can occur while framing JSON messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header has no `Content-Length` field.
    #[error("frame header is missing Content-Length")]
    MissingContentLength,

    /// The frame header could not be parsed.
    #[error("invalid frame header: {0}")]
    InvalidHeader(String),

    /// The body exceeds the configured maximum size.
    #[error("frame body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// The frame body is not valid UTF-8 JSON.
    #[error("frame body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended cleanly between frames; there are no more messages.
    ///
    /// This is the normal shutdown signal, not a failure.
    #[error("no more messages")]
    EndOfMessages,

    /// The stream ended in the middle of a frame.
    #[error("stream ended mid-frame (truncated frame)")]
    TruncatedFrame,

    /// The connection was closed before a frame could be written.
    #[error("connection closed while writing frame")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
