use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use dapwire_transport::DapStream;
use serde_json::Value;
use tracing::trace;

use crate::codec::{decode_message, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete framed JSON values from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete messages.
pub struct JsonReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> JsonReader<T> {
    /// Create a new reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete JSON message (blocking).
    ///
    /// Returns `Err(FrameError::EndOfMessages)` on a clean end-of-stream
    /// between frames, and `Err(FrameError::TruncatedFrame)` if the stream
    /// ends in the middle of one.
    pub fn read_message(&mut self) -> Result<Value> {
        loop {
            if let Some(value) = decode_message(&mut self.buf, self.config.max_body_size)? {
                trace!(bytes = self.buf.len(), "decoded frame");
                return Ok(value);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Err(FrameError::EndOfMessages);
                }
                return Err(FrameError::TruncatedFrame);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl JsonReader<DapStream> {
    /// Create a reader for a [`DapStream`] and apply the read timeout from config.
    pub fn with_config_stream(inner: DapStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: dapwire_transport::TransportError) -> FrameError {
    match err {
        dapwire_transport::TransportError::Io(io)
        | dapwire_transport::TransportError::Accept(io) => FrameError::Io(io),
        dapwire_transport::TransportError::Bind { source, .. }
        | dapwire_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};
    use serde_json::json;

    use super::*;
    use crate::codec::{encode_message, DEFAULT_MAX_BODY};

    fn wire_for(values: &[Value]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for value in values {
            encode_message(value, &mut buf, DEFAULT_MAX_BODY).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_message() {
        let wire = wire_for(&[json!({"seq": 1, "type": "event", "event": "stopped"})]);
        let mut reader = JsonReader::new(Cursor::new(wire));

        let value = reader.read_message().unwrap();
        assert_eq!(value["event"], "stopped");
    }

    #[test]
    fn read_multiple_messages_in_order() {
        let wire = wire_for(&[json!({"seq": 1}), json!({"seq": 2}), json!({"seq": 3})]);
        let mut reader = JsonReader::new(Cursor::new(wire));

        for expected in 1..=3 {
            let value = reader.read_message().unwrap();
            assert_eq!(value["seq"], expected);
        }
    }

    #[test]
    fn read_large_body() {
        let payload = "y".repeat(64 * 1024);
        let wire = wire_for(&[json!({"data": payload})]);
        let mut reader = JsonReader::new(Cursor::new(wire));

        let value = reader.read_message().unwrap();
        assert_eq!(value["data"].as_str().unwrap().len(), 64 * 1024);
    }

    #[test]
    fn partial_read_handling() {
        let wire = wire_for(&[json!({"slow": true})]);
        let mut reader = JsonReader::new(ByteByByteReader { bytes: wire, pos: 0 });

        let value = reader.read_message().unwrap();
        assert_eq!(value, json!({"slow": true}));
    }

    #[test]
    fn clean_eof_is_end_of_messages() {
        let mut reader = JsonReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::EndOfMessages));
    }

    #[test]
    fn eof_mid_frame_is_truncated() {
        let mut wire = wire_for(&[json!({"seq": 42})]);
        wire.truncate(wire.len() - 3);

        let mut reader = JsonReader::new(Cursor::new(wire));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::TruncatedFrame));
    }

    #[test]
    fn garbled_header_is_fatal() {
        let mut reader = JsonReader::new(Cursor::new(b"HTTP/1.1 200 OK\r\n\r\n".to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::InvalidHeader(_)));
    }

    #[test]
    fn oversized_body_is_fatal() {
        let mut wire = BytesMut::new();
        wire.put_slice(b"Content-Length: 1048576\r\n\r\n");

        let cfg = FrameConfig {
            max_body_size: 1024,
            ..FrameConfig::default()
        };
        let mut reader = JsonReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::BodyTooLarge { .. }));
    }

    #[test]
    fn interrupted_read_retries() {
        let wire = wire_for(&[json!({"retry": 1})]);
        let mut reader = JsonReader::new(InterruptedThenData {
            interrupted: false,
            bytes: wire,
            pos: 0,
        });

        let value = reader.read_message().unwrap();
        assert_eq!(value, json!({"retry": 1}));
    }

    #[test]
    fn would_block_propagates_io_error() {
        let mut reader = JsonReader::new(AlwaysWouldBlock);
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn roundtrip_over_memory_pair() {
        let (left, right) = DapStream::pair();
        let mut writer = crate::writer::JsonWriter::new(left);
        let mut reader = JsonReader::new(right);

        writer.write_message(&json!({"type": "request", "seq": 1})).unwrap();
        let value = reader.read_message().unwrap();
        assert_eq!(value["type"], "request");
    }

    #[test]
    fn applies_read_timeout_for_dap_stream() {
        let (_left, right) = DapStream::pair();
        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let mut reader = JsonReader::with_config_stream(right, cfg).unwrap();
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct AlwaysWouldBlock;

    impl Read for AlwaysWouldBlock {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }
}
