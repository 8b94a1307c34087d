use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;

use crate::error::{FrameError, Result};

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// Maximum accepted header block size. Headers are a handful of short ASCII
/// lines; anything bigger is a garbled stream.
const MAX_HEADER_SIZE: usize = 8 * 1024;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH: &str = "Content-Length";

/// Encode one JSON value into the wire format.
///
/// Wire format:
/// ```text
/// Content-Length: <N>\r\n
/// \r\n
/// <N bytes of UTF-8 JSON>
/// ```
pub fn encode_message(value: &Value, dst: &mut BytesMut, max_body: usize) -> Result<()> {
    let body = serde_json::to_vec(value)?;
    if body.len() > max_body {
        return Err(FrameError::BodyTooLarge {
            size: body.len(),
            max: max_body,
        });
    }

    let header = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len());
    dst.reserve(header.len() + body.len());
    dst.put_slice(header.as_bytes());
    dst.put_slice(&body);
    Ok(())
}

/// Decode one JSON value from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. Headers other than
/// `Content-Length` (e.g. `Content-Type`) are tolerated and ignored.
pub fn decode_message(src: &mut BytesMut, max_body: usize) -> Result<Option<Value>> {
    let Some(header_len) = find_header_end(src) else {
        if src.len() > MAX_HEADER_SIZE {
            return Err(FrameError::InvalidHeader(
                "header block exceeds maximum size".to_string(),
            ));
        }
        return Ok(None); // Need more data
    };

    let body_len = parse_content_length(&src[..header_len])?;
    if body_len > max_body {
        return Err(FrameError::BodyTooLarge {
            size: body_len,
            max: max_body,
        });
    }

    let total = header_len + HEADER_TERMINATOR.len() + body_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(header_len + HEADER_TERMINATOR.len());
    let body = src.split_to(body_len);
    let value: Value = serde_json::from_slice(&body)?;
    Ok(Some(value))
}

/// Byte offset of the `\r\n\r\n` terminator, if present.
fn find_header_end(src: &[u8]) -> Option<usize> {
    src.windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

fn parse_content_length(header: &[u8]) -> Result<usize> {
    let header = std::str::from_utf8(header)
        .map_err(|_| FrameError::InvalidHeader("header is not ASCII".to_string()))?;

    for line in header.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(FrameError::InvalidHeader(format!(
                "malformed header line: {line:?}"
            )));
        };
        if name.trim() == CONTENT_LENGTH {
            return value.trim().parse::<usize>().map_err(|_| {
                FrameError::InvalidHeader(format!("bad Content-Length value: {:?}", value.trim()))
            });
        }
    }

    Err(FrameError::MissingContentLength)
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default: 16 MiB.
    pub max_body_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
