use std::io::{Read, Write};
use std::net::TcpStream;

use crate::error::Result;
use crate::memory::MemoryStream;

/// A connected duplex byte stream — implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// The channel layer clones it once so the reader thread and concurrent
/// senders each hold their own half.
pub struct DapStream {
    inner: DapStreamInner,
}

enum DapStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Memory(MemoryStream),
}

impl Read for DapStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DapStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            DapStreamInner::Unix(stream) => stream.read(buf),
            DapStreamInner::Memory(stream) => stream.read(buf),
        }
    }
}

impl Write for DapStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DapStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            DapStreamInner::Unix(stream) => stream.write(buf),
            DapStreamInner::Memory(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            DapStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            DapStreamInner::Unix(stream) => stream.flush(),
            DapStreamInner::Memory(stream) => stream.flush(),
        }
    }
}

impl DapStream {
    /// Create a stream from a connected TCP socket.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: DapStreamInner::Tcp(stream),
        }
    }

    /// Create a stream from a connected Unix domain socket.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: DapStreamInner::Unix(stream),
        }
    }

    /// Create a stream from one end of an in-memory pair.
    pub fn from_memory(stream: MemoryStream) -> Self {
        Self {
            inner: DapStreamInner::Memory(stream),
        }
    }

    /// Create a connected in-memory stream pair (test double).
    pub fn pair() -> (Self, Self) {
        let (left, right) = MemoryStream::pair();
        (Self::from_memory(left), Self::from_memory(right))
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            DapStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            DapStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            DapStreamInner::Memory(stream) => {
                stream.set_read_timeout(timeout);
                Ok(())
            }
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            DapStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            DapStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            DapStreamInner::Memory(_) => Ok(()),
        }
    }

    /// Try to clone this stream (creates a new handle to the same connection).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            DapStreamInner::Tcp(stream) => DapStreamInner::Tcp(stream.try_clone()?),
            #[cfg(unix)]
            DapStreamInner::Unix(stream) => DapStreamInner::Unix(stream.try_clone()?),
            DapStreamInner::Memory(stream) => DapStreamInner::Memory(stream.clone()),
        };
        Ok(Self { inner })
    }

    /// Shut down both directions, unblocking any thread parked in `read`.
    ///
    /// After shutdown a reader observes end-of-stream (a clean close, not an
    /// I/O error).
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            DapStreamInner::Tcp(stream) => stream
                .shutdown(std::net::Shutdown::Both)
                .or_else(ignore_not_connected)
                .map_err(Into::into),
            #[cfg(unix)]
            DapStreamInner::Unix(stream) => stream
                .shutdown(std::net::Shutdown::Both)
                .or_else(ignore_not_connected)
                .map_err(Into::into),
            DapStreamInner::Memory(stream) => {
                stream.close();
                Ok(())
            }
        }
    }
}

// Shutting down twice reports NotConnected on most platforms; callers treat
// shutdown as idempotent.
fn ignore_not_connected(err: std::io::Error) -> std::io::Result<()> {
    if err.kind() == std::io::ErrorKind::NotConnected {
        Ok(())
    } else {
        Err(err)
    }
}

impl std::fmt::Debug for DapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            DapStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            DapStreamInner::Unix(_) => "unix",
            DapStreamInner::Memory(_) => "memory",
        };
        f.debug_struct("DapStream").field("type", &kind).finish()
    }
}
