//! Content-Length framed JSON messaging over byte streams.
//!
//! dapwire speaks the debug-adapter wire dialect: each message is a JSON
//! body prefixed by a `Content-Length` header, and messages are requests,
//! responses correlated by sequence number, or one-way events.
//!
//! # Crate Structure
//!
//! - [`transport`] — Byte streams (TCP, Unix sockets, in-memory pairs)
//! - [`frame`] — Content-Length framing: readers and writers of JSON values
//! - [`schema`] — Datatype declarations and payload validation
//! - [`channel`] — Bidirectional request/response/event channels

/// Re-export transport types.
pub mod transport {
    pub use dapwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dapwire_frame::*;
}

/// Re-export schema types.
pub mod schema {
    pub use dapwire_schema::*;
}

/// Re-export channel types.
pub mod channel {
    pub use dapwire_channel::*;
}

pub mod logging;
