//! The wire envelope.
//!
//! Every frame body is one [`Message`]: a request, a response correlated to
//! a request by `request_seq`, or a fire-and-forget event. The `type` field
//! tags the variant; optional payload fields are omitted entirely rather
//! than sent as `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, Result};

/// A request: the sender expects exactly one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub seq: u64,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// A response to an earlier request.
///
/// `success: false` carries a human-readable `message` and no meaningful
/// body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub seq: u64,
    pub request_seq: u64,
    pub command: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// A one-way notification; no response is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Request(Request),
    Response(Response),
    Event(Event),
}

impl Message {
    /// Parse a decoded frame body into a message envelope.
    pub fn from_value(value: Value) -> Result<Message> {
        serde_json::from_value(value).map_err(|err| ChannelError::InvalidMessage {
            reason: err.to_string(),
        })
    }

    /// Serialize the envelope for framing.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|err| ChannelError::InvalidMessage {
            reason: err.to_string(),
        })
    }

    /// The sender-assigned sequence number.
    pub fn seq(&self) -> u64 {
        match self {
            Message::Request(r) => r.seq,
            Message::Response(r) => r.seq,
            Message::Event(e) => e.seq,
        }
    }
}

impl Response {
    /// A success response.
    pub fn success(seq: u64, request_seq: u64, command: &str, body: Option<Value>) -> Response {
        Response {
            seq,
            request_seq,
            command: command.to_owned(),
            success: true,
            message: None,
            body,
        }
    }

    /// A failure response. Failures always carry a message and no body.
    pub fn failure(
        seq: u64,
        request_seq: u64,
        command: &str,
        message: impl Into<String>,
    ) -> Response {
        Response {
            seq,
            request_seq,
            command: command.to_owned(),
            success: false,
            message: Some(message.into()),
            body: None,
        }
    }

    /// The body of a successful response, or the failure as an error.
    pub fn into_body(self) -> Result<Option<Value>> {
        if self.success {
            Ok(self.body)
        } else {
            Err(ChannelError::RequestFailed {
                command: self.command,
                message: self
                    .message
                    .unwrap_or_else(|| "no failure message".to_owned()),
            })
        }
    }

    /// A failure response synthesized locally when the channel shuts down
    /// with the request still in flight.
    pub(crate) fn channel_closed(request_seq: u64, command: &str) -> Response {
        Response::failure(0, request_seq, command, "channel closed")
    }
}
