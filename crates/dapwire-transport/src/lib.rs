//! Duplex byte transports for the dapwire debug protocol.
//!
//! A debug adapter conversation runs over one byte-oriented duplex
//! connection. This crate provides the concrete transports:
//! - TCP sockets (the common front-end attach path)
//! - Unix domain sockets (Linux/macOS)
//! - In-memory stream pairs (test double)
//!
//! Everything else builds on top of the [`DapStream`] type provided here.

pub mod error;
pub mod memory;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::MemoryStream;
pub use tcp::TcpTransport;
pub use traits::DapStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
