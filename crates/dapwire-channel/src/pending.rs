//! In-flight request tracking.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::message::Response;

type Callback = Box<dyn FnOnce(&Response) + Send>;

/// Completion state shared between the sender of a request and the reader
/// thread that will see its response.
///
/// Completes at most once; later completions are ignored. Callbacks run
/// outside the state lock, so a callback may itself touch the channel.
#[derive(Default)]
pub(crate) struct PendingResponse {
    state: Mutex<State>,
    ready: Condvar,
}

#[derive(Default)]
struct State {
    response: Option<Response>,
    callbacks: Vec<Callback>,
}

impl PendingResponse {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn complete(&self, response: Response) {
        let callbacks = {
            let mut state = self.lock();
            if state.response.is_some() {
                return;
            }
            state.response = Some(response.clone());
            std::mem::take(&mut state.callbacks)
        };
        self.ready.notify_all();
        for callback in callbacks {
            callback(&response);
        }
    }

    fn wait(&self) -> Response {
        let mut state = self.lock();
        loop {
            if let Some(response) = &state.response {
                return response.clone();
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> Option<Response> {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(response) = &state.response {
                return Some(response.clone());
            }
            let remaining = deadline.checked_duration_since(std::time::Instant::now())?;
            let (guard, _timed_out) = self
                .ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }

    fn on_response(&self, callback: Callback) {
        let ready = {
            let mut state = self.lock();
            match &state.response {
                Some(response) => Some(response.clone()),
                None => {
                    state.callbacks.push(callback);
                    return;
                }
            }
        };
        if let Some(response) = ready {
            callback(&response);
        }
    }

    fn response(&self) -> Option<Response> {
        self.lock().response.clone()
    }
}

/// Handle to a request sent to the peer.
///
/// The response can be awaited (blocking, with or without a timeout),
/// polled, or observed through a callback. All of these see the same
/// response, including the failure synthesized when the channel closes
/// with the request still unanswered.
pub struct OutgoingRequest {
    seq: u64,
    command: String,
    pending: Arc<PendingResponse>,
}

impl std::fmt::Debug for OutgoingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutgoingRequest")
            .field("seq", &self.seq)
            .field("command", &self.command)
            .field("response", &self.pending.response())
            .finish()
    }
}

impl OutgoingRequest {
    pub(crate) fn new(seq: u64, command: String, pending: Arc<PendingResponse>) -> Self {
        OutgoingRequest {
            seq,
            command,
            pending,
        }
    }

    /// The sequence number this request went out with.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Block until the response arrives.
    pub fn wait(&self) -> Response {
        self.pending.wait()
    }

    /// Block until the response arrives or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Response> {
        self.pending.wait_timeout(timeout)
    }

    /// The response, if it has already arrived.
    pub fn response(&self) -> Option<Response> {
        self.pending.response()
    }

    /// Run `callback` when the response arrives. If it has already
    /// arrived, the callback runs immediately on the calling thread;
    /// otherwise it runs on the channel's reader thread.
    pub fn on_response(&self, callback: impl FnOnce(&Response) + Send + 'static) {
        self.pending.on_response(Box::new(callback));
    }
}
