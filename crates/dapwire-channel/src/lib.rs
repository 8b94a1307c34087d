//! Bidirectional request/response/event messaging over a framed JSON
//! stream.
//!
//! A [`Channel`] pairs a dedicated reader thread with a mutex-guarded
//! writer. Outgoing requests get a monotonically increasing sequence
//! number and an [`OutgoingRequest`] handle whose response can be awaited
//! or observed via callback; incoming requests and events dispatch by name
//! into a [`HandlerSet`]. Payloads are checked against the channel's
//! [`MessageSchemas`](dapwire_schema::MessageSchemas) in both directions.

pub mod channel;
pub mod error;
pub mod handlers;
pub mod message;
mod pending;

pub use channel::{Channel, ChannelConfig, Responder};
pub use error::{ChannelError, Result};
pub use handlers::{
    EventHandler, HandlerSet, IncomingEvent, IncomingRequest, Outcome, RequestHandler,
};
pub use message::{Event, Message, Request, Response};
pub use pending::OutgoingRequest;
