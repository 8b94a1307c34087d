use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// One direction of an in-memory byte pipe.
struct PipeState {
    buf: VecDeque<u8>,
    closed: bool,
}

struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

impl Pipe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PipeState {
                buf: VecDeque::new(),
                closed: false,
            }),
            readable: Condvar::new(),
        })
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.closed = true;
        self.readable.notify_all();
    }

    fn write(&self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        }
        state.buf.extend(buf);
        self.readable.notify_all();
        Ok(buf.len())
    }

    fn read(&self, buf: &mut [u8], timeout: Option<Duration>) -> std::io::Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while state.buf.is_empty() {
            if state.closed {
                return Ok(0); // clean end-of-stream
            }
            match timeout {
                Some(timeout) => {
                    let (next, wait) = self
                        .readable
                        .wait_timeout(state, timeout)
                        .unwrap_or_else(|e| e.into_inner());
                    state = next;
                    if wait.timed_out() && state.buf.is_empty() && !state.closed {
                        return Err(std::io::Error::from(std::io::ErrorKind::WouldBlock));
                    }
                }
                None => {
                    state = self
                        .readable
                        .wait(state)
                        .unwrap_or_else(|e| e.into_inner());
                }
            }
        }

        let n = buf.len().min(state.buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = state.buf.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}

/// One end of an in-memory duplex byte connection.
///
/// Behaves like a socket pair: bytes written on one end become readable on
/// the other, reads block until data arrives, and closing either end gives
/// the peer a clean end-of-stream. Used as the test double for real
/// transports.
pub struct MemoryStream {
    incoming: Arc<Pipe>,
    outgoing: Arc<Pipe>,
    read_timeout: Mutex<Option<Duration>>,
}

impl MemoryStream {
    /// Create a connected pair of in-memory streams.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Pipe::new();
        let b_to_a = Pipe::new();
        let left = Self {
            incoming: Arc::clone(&b_to_a),
            outgoing: Arc::clone(&a_to_b),
            read_timeout: Mutex::new(None),
        };
        let right = Self {
            incoming: a_to_b,
            outgoing: b_to_a,
            read_timeout: Mutex::new(None),
        };
        (left, right)
    }

    /// Close both directions. Blocked readers on either end wake up and
    /// observe end-of-stream. Idempotent.
    pub fn close(&self) {
        self.incoming.close();
        self.outgoing.close();
    }

    /// Set the read timeout; `None` blocks indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) {
        *self
            .read_timeout
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = timeout;
    }
}

impl Clone for MemoryStream {
    fn clone(&self) -> Self {
        let timeout = *self
            .read_timeout
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        Self {
            incoming: Arc::clone(&self.incoming),
            outgoing: Arc::clone(&self.outgoing),
            read_timeout: Mutex::new(timeout),
        }
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let timeout = *self
            .read_timeout
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        self.incoming.read(buf, timeout)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.outgoing.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStream").finish()
    }
}
