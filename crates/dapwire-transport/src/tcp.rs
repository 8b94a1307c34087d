use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DapStream;

/// TCP socket transport.
///
/// The usual attach path for a debugger front-end: the adapter listens on a
/// local port and the front-end connects, or vice versa. `TCP_NODELAY` is
/// set on every stream since frames are small and latency-sensitive.
pub struct TcpTransport {
    listener: TcpListener,
    addr: std::net::SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on the given address.
    ///
    /// Bind to port 0 to let the OS pick a free port; the chosen address is
    /// available via [`TcpTransport::local_addr`].
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: format!("{addr:?}"),
            source: e,
        })?;
        let addr = listener.local_addr()?;
        info!(%addr, "listening on tcp socket");
        Ok(Self { listener, addr })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<DapStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true).map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(DapStream::from_tcp(stream))
    }

    /// Connect to a listening peer (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<DapStream> {
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            addr: format!("{addr:?}"),
            source: e,
        })?;
        stream.set_nodelay(true)?;
        debug!(addr = ?addr, "connected to tcp socket");
        Ok(DapStream::from_tcp(stream))
    }

    /// The address this transport is bound to.
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn bind_accept_connect() {
        let transport = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = transport.local_addr();

        let client = std::thread::spawn(move || {
            let mut stream = TcpTransport::connect(addr).unwrap();
            stream.write_all(b"hello").unwrap();
        });

        let mut server = transport.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        client.join().unwrap();
    }

    #[test]
    fn connect_refused() {
        // Bind then drop to get a port that is very likely unused.
        let transport = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = transport.local_addr();
        drop(transport);

        let result = TcpTransport::connect(addr);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
