//! The bidirectional message channel.
//!
//! A [`Channel`] owns one stream. Outgoing messages go through a shared
//! writer behind a mutex, so frames never interleave. Incoming messages
//! are read by a dedicated reader thread, which dispatches requests and
//! events into the [`HandlerSet`] and completes in-flight outgoing
//! requests when their responses arrive. When the stream ends, cleanly or
//! not, every still-unanswered outgoing request completes with a
//! synthesized failure so no waiter blocks forever.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use dapwire_frame::{FrameConfig, FrameError, JsonReader, JsonWriter};
use dapwire_schema::MessageSchemas;
use dapwire_transport::DapStream;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::error::{ChannelError, Result};
use crate::handlers::{HandlerSet, IncomingEvent, IncomingRequest, Outcome};
use crate::message::{Event, Message, Request, Response};
use crate::pending::{OutgoingRequest, PendingResponse};

/// Channel settings.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Name used in logs and the reader thread name.
    pub name: String,
    pub frame: FrameConfig,
    pub schemas: MessageSchemas,
    /// Check received payloads against the schemas.
    pub validate_incoming: bool,
    /// Check payloads against the schemas before sending.
    pub validate_outgoing: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "channel".to_owned(),
            frame: FrameConfig::default(),
            schemas: MessageSchemas::empty(),
            validate_incoming: true,
            validate_outgoing: true,
        }
    }
}

struct Shared {
    name: String,
    writer: Mutex<JsonWriter<DapStream>>,
    pending: Mutex<HashMap<u64, (String, Arc<PendingResponse>)>>,
    next_seq: AtomicU64,
    closed: AtomicBool,
    schemas: MessageSchemas,
    validate_incoming: bool,
    validate_outgoing: bool,
}

impl Shared {
    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, (String, Arc<PendingResponse>)>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send(&self, message: &Message) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        let value = message.to_value()?;
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_message(&value)?;
        trace!(channel = %self.name, seq = message.seq(), "sent message");
        Ok(())
    }

    /// Send a response for `request_seq`. A success body that fails its
    /// declared schema goes out as a failure instead of leaking an invalid
    /// payload to the peer.
    fn respond(
        &self,
        request_seq: u64,
        command: &str,
        outcome: std::result::Result<Option<Value>, String>,
    ) -> Result<()> {
        let outcome = match outcome {
            Ok(body) if self.validate_outgoing => {
                match self.schemas.check_response(command, body.as_ref()) {
                    Ok(()) => Ok(body),
                    Err(err) => {
                        warn!(channel = %self.name, command, %err, "response body failed schema");
                        Err(format!("invalid response body: {err}"))
                    }
                }
            }
            other => other,
        };
        let response = match outcome {
            Ok(body) => Response::success(self.next_seq(), request_seq, command, body),
            Err(message) => Response::failure(self.next_seq(), request_seq, command, message),
        };
        self.send(&Message::Response(response))
    }

    /// Complete every in-flight request with a synthesized failure.
    fn fail_pending(&self) {
        let drained: Vec<_> = self.pending().drain().collect();
        for (request_seq, (command, pending)) in drained {
            debug!(channel = %self.name, request_seq, "failing request on shutdown");
            pending.complete(Response::channel_closed(request_seq, &command));
        }
    }
}

/// Handle for answering a request after its handler has returned.
///
/// Cloneable, but the request is answered at most once; later attempts
/// get [`ChannelError::AlreadyAnswered`].
#[derive(Clone)]
pub struct Responder {
    shared: Arc<Shared>,
    request_seq: u64,
    command: String,
    answered: Arc<AtomicBool>,
}

impl Responder {
    /// Send a success response with `body`.
    pub fn respond(&self, body: Option<Value>) -> Result<()> {
        self.finish(Ok(body))
    }

    /// Send a failure response with `message`.
    pub fn fail(&self, message: impl Into<String>) -> Result<()> {
        self.finish(Err(message.into()))
    }

    fn finish(&self, outcome: std::result::Result<Option<Value>, String>) -> Result<()> {
        if self.answered.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::AlreadyAnswered {
                request_seq: self.request_seq,
            });
        }
        self.shared.respond(self.request_seq, &self.command, outcome)
    }
}

/// A bidirectional request/response/event channel over one stream.
pub struct Channel {
    shared: Arc<Shared>,
    stream: DapStream,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Channel {
    /// Start a channel on `stream`: spawn the reader thread and hand it
    /// the handler set.
    pub fn start(stream: DapStream, handlers: HandlerSet, config: ChannelConfig) -> Result<Channel> {
        let reader = JsonReader::with_config_stream(stream.try_clone()?, config.frame.clone())?;
        let writer = JsonWriter::with_config_stream(stream.try_clone()?, config.frame)?;

        let shared = Arc::new(Shared {
            name: config.name,
            writer: Mutex::new(writer),
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            schemas: config.schemas,
            validate_incoming: config.validate_incoming,
            validate_outgoing: config.validate_outgoing,
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("{} reader", shared.name))
            .spawn(move || read_loop(thread_shared, reader, handlers))
            .map_err(FrameError::Io)?;

        info!(channel = %shared.name, "channel started");
        Ok(Channel {
            shared,
            stream,
            reader: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Send a request and return a handle to its eventual response.
    ///
    /// Arguments are validated against the command's declared schema
    /// before anything hits the wire.
    pub fn send_request(&self, command: &str, arguments: Option<Value>) -> Result<OutgoingRequest> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        if self.shared.validate_outgoing {
            self.shared.schemas.check_request(command, arguments.as_ref())?;
        }

        let seq = self.shared.next_seq();
        let pending = Arc::new(PendingResponse::default());
        self.shared
            .pending()
            .insert(seq, (command.to_owned(), Arc::clone(&pending)));

        let message = Message::Request(Request {
            seq,
            command: command.to_owned(),
            arguments,
        });
        if let Err(err) = self.shared.send(&message) {
            self.shared.pending().remove(&seq);
            return Err(err);
        }
        Ok(OutgoingRequest::new(seq, command.to_owned(), pending))
    }

    /// Send an event. No response is expected.
    pub fn send_event(&self, event: &str, body: Option<Value>) -> Result<()> {
        if self.shared.validate_outgoing {
            self.shared.schemas.check_event(event, body.as_ref())?;
        }
        let seq = self.shared.next_seq();
        self.shared.send(&Message::Event(Event {
            seq,
            event: event.to_owned(),
            body,
        }))
    }

    /// Close the channel: shut the stream down, which unblocks the reader
    /// thread and fails every in-flight request. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(channel = %self.shared.name, "closing channel");
        self.stream.shutdown()?;
        Ok(())
    }

    /// Wait for the reader thread to finish.
    pub fn join(&self) {
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn read_loop(shared: Arc<Shared>, mut reader: JsonReader<DapStream>, mut handlers: HandlerSet) {
    loop {
        let value = match reader.read_message() {
            Ok(value) => value,
            Err(FrameError::EndOfMessages) => {
                debug!(channel = %shared.name, "peer closed cleanly");
                break;
            }
            Err(err) => {
                if shared.closed.load(Ordering::SeqCst) {
                    debug!(channel = %shared.name, %err, "reader stopping after close");
                } else {
                    warn!(channel = %shared.name, %err, "read failed");
                }
                break;
            }
        };

        let message = match Message::from_value(value) {
            Ok(message) => message,
            Err(err) => {
                warn!(channel = %shared.name, %err, "dropping unparseable message");
                continue;
            }
        };

        match message {
            Message::Request(request) => handle_request(&shared, &mut handlers, request),
            Message::Response(response) => handle_response(&shared, response),
            Message::Event(event) => handle_event(&shared, &mut handlers, event),
        }
    }

    shared.closed.store(true, Ordering::SeqCst);
    shared.fail_pending();
    debug!(channel = %shared.name, "reader thread exiting");
}

fn handle_request(shared: &Arc<Shared>, handlers: &mut HandlerSet, request: Request) {
    trace!(channel = %shared.name, seq = request.seq, command = %request.command, "request");

    if shared.validate_incoming {
        if let Err(err) = shared
            .schemas
            .check_request(&request.command, request.arguments.as_ref())
        {
            let _ = shared.respond(
                request.seq,
                &request.command,
                Err(format!("invalid arguments: {err}")),
            );
            return;
        }
    }

    let responder = Responder {
        shared: Arc::clone(shared),
        request_seq: request.seq,
        command: request.command.clone(),
        answered: Arc::new(AtomicBool::new(false)),
    };
    let incoming = IncomingRequest::new(request.seq, request.command, request.arguments, responder);

    // A panicking handler must not take the reader thread down with it;
    // that would leave both sides' in-flight requests hanging.
    let outcome = match handlers.request_handler(incoming.command()) {
        Some(handler) => {
            match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&incoming))) {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        channel = %shared.name,
                        command = %incoming.command(),
                        "request handler panicked"
                    );
                    Outcome::Fail(format!("internal error handling {:?}", incoming.command()))
                }
            }
        }
        None => Outcome::Fail(format!("unknown command {:?}", incoming.command())),
    };

    let sent = match outcome {
        Outcome::Respond(body) => incoming.responder().respond(body),
        Outcome::Fail(message) => incoming.responder().fail(message),
        Outcome::Deferred => Ok(()),
    };
    match sent {
        Ok(()) => {}
        Err(ChannelError::AlreadyAnswered { request_seq }) => {
            debug!(channel = %shared.name, request_seq, "request answered before handler returned");
        }
        Err(err) => warn!(channel = %shared.name, %err, "failed to send response"),
    }
}

fn handle_response(shared: &Shared, response: Response) {
    let entry = shared.pending().remove(&response.request_seq);
    let Some((command, pending)) = entry else {
        warn!(
            channel = %shared.name,
            request_seq = response.request_seq,
            "response for unknown request"
        );
        return;
    };

    let response = if response.success && shared.validate_incoming {
        match shared.schemas.check_response(&command, response.body.as_ref()) {
            Ok(()) => response,
            Err(err) => {
                warn!(channel = %shared.name, command = %command, %err, "response body failed schema");
                Response {
                    success: false,
                    message: Some(format!("invalid response body: {err}")),
                    body: None,
                    ..response
                }
            }
        }
    } else {
        response
    };
    pending.complete(response);
}

fn handle_event(shared: &Shared, handlers: &mut HandlerSet, event: Event) {
    if shared.validate_incoming {
        if let Err(err) = shared.schemas.check_event(&event.event, event.body.as_ref()) {
            warn!(channel = %shared.name, event = %event.event, %err, "dropping event with invalid body");
            return;
        }
    }

    let incoming = IncomingEvent {
        seq: event.seq,
        event: event.event,
        body: event.body,
    };
    match handlers.event_handler(&incoming.event) {
        Some(handler) => {
            if panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&incoming))).is_err() {
                warn!(channel = %shared.name, event = %incoming.event, "event handler panicked");
            }
        }
        None => debug!(channel = %shared.name, event = %incoming.event, "no handler for event"),
    }
}
