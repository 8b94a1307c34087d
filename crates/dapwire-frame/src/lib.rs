//! `Content-Length` framed JSON values over byte streams.
//!
//! The Debug Adapter Protocol frames each JSON message as a short ASCII
//! header (`Content-Length: <N>` followed by a blank line) and exactly `N`
//! bytes of UTF-8 JSON body. This crate turns any `Read`/`Write` pair into a
//! sequence of discrete [`serde_json::Value`]s in each direction.
//!
//! Object key order survives a read/write round trip (`serde_json` with
//! `preserve_order`); it carries no protocol meaning but keeps logs and
//! transcripts deterministic.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_message, encode_message, FrameConfig, DEFAULT_MAX_BODY};
pub use error::{FrameError, Result};
pub use reader::JsonReader;
pub use writer::JsonWriter;
