//! Handler registration and dispatch.
//!
//! Incoming requests and events dispatch by name: a handler registered for
//! the exact command or event name wins, otherwise the catch-all handler
//! (if any) runs. A request with no handler at all gets an automatic
//! failure response; an event with no handler is dropped with a log line.

use std::collections::HashMap;

use serde_json::Value;

use crate::channel::Responder;

/// What a request handler decided.
pub enum Outcome {
    /// Send a success response with this body.
    Respond(Option<Value>),
    /// Send a failure response with this message.
    Fail(String),
    /// The handler kept a [`Responder`] and will answer later, possibly
    /// from another thread or from a later handler invocation.
    Deferred,
}

/// An incoming request as seen by its handler.
pub struct IncomingRequest {
    seq: u64,
    command: String,
    arguments: Option<Value>,
    responder: Responder,
}

impl IncomingRequest {
    pub(crate) fn new(
        seq: u64,
        command: String,
        arguments: Option<Value>,
        responder: Responder,
    ) -> Self {
        IncomingRequest {
            seq,
            command,
            arguments,
            responder,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn arguments(&self) -> Option<&Value> {
        self.arguments.as_ref()
    }

    /// A handle for answering this request outside the handler, paired
    /// with returning [`Outcome::Deferred`]. Whichever answer happens
    /// first wins; the request is answered at most once.
    pub fn responder(&self) -> Responder {
        self.responder.clone()
    }
}

/// An incoming event as seen by its handler.
pub struct IncomingEvent {
    pub seq: u64,
    pub event: String,
    pub body: Option<Value>,
}

pub trait RequestHandler: Send {
    fn handle(&mut self, request: &IncomingRequest) -> Outcome;
}

impl<F> RequestHandler for F
where
    F: FnMut(&IncomingRequest) -> Outcome + Send,
{
    fn handle(&mut self, request: &IncomingRequest) -> Outcome {
        self(request)
    }
}

pub trait EventHandler: Send {
    fn handle(&mut self, event: &IncomingEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(&IncomingEvent) + Send,
{
    fn handle(&mut self, event: &IncomingEvent) {
        self(event)
    }
}

/// The set of handlers a channel dispatches into.
///
/// Owned by the channel's reader thread once the channel starts, so
/// handlers run one at a time and may hold mutable state without locking.
#[derive(Default)]
pub struct HandlerSet {
    requests: HashMap<String, Box<dyn RequestHandler>>,
    any_request: Option<Box<dyn RequestHandler>>,
    events: HashMap<String, Box<dyn EventHandler>>,
    any_event: Option<Box<dyn EventHandler>>,
}

impl HandlerSet {
    pub fn new() -> HandlerSet {
        HandlerSet::default()
    }

    /// Handle requests for one specific command.
    pub fn on_request(mut self, command: &str, handler: impl RequestHandler + 'static) -> Self {
        self.requests.insert(command.to_owned(), Box::new(handler));
        self
    }

    /// Handle requests no specific handler claims.
    pub fn on_any_request(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.any_request = Some(Box::new(handler));
        self
    }

    /// Handle one specific event.
    pub fn on_event(mut self, event: &str, handler: impl EventHandler + 'static) -> Self {
        self.events.insert(event.to_owned(), Box::new(handler));
        self
    }

    /// Handle events no specific handler claims.
    pub fn on_any_event(mut self, handler: impl EventHandler + 'static) -> Self {
        self.any_event = Some(Box::new(handler));
        self
    }

    pub(crate) fn request_handler(
        &mut self,
        command: &str,
    ) -> Option<&mut (dyn RequestHandler + 'static)> {
        if self.requests.contains_key(command) {
            return self.requests.get_mut(command).map(Box::as_mut);
        }
        self.any_request.as_deref_mut()
    }

    pub(crate) fn event_handler(
        &mut self,
        event: &str,
    ) -> Option<&mut (dyn EventHandler + 'static)> {
        if self.events.contains_key(event) {
            return self.events.get_mut(event).map(Box::as_mut);
        }
        self.any_event.as_deref_mut()
    }
}
