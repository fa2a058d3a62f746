//! Wire messages for GABP
//!
//! Messages are serialized as JSON with an internally-tagged enum.
//! Format: {"v":"gabp/1","id":"...","type":"request",...fields}
//!
//! Field names are the exact lower-case wire identifiers; the server
//! generates fresh UUID ids for responses and events and echoes the
//! request id in its matching response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Protocol version literal carried in every envelope
pub const PROTOCOL_VERSION: &str = "gabp/1";

/// Schema version reported in the handshake welcome
pub const SCHEMA_VERSION: &str = "1.0";

/// Messages exchanged between a GABP server and bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Method invocation from the bridge
    Request {
        v: String,
        id: String,
        method: String,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        params: Value,
    },

    /// Completion of a request; exactly one of `result` / `error` is present
    Response {
        v: String,
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorObject>,
    },

    /// Push notification on a subscribed channel
    Event {
        v: String,
        id: String,
        channel: String,
        seq: u64,
        payload: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
}

/// Error object carried in a failed response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<&crate::GabpError> for ErrorObject {
    fn from(err: &crate::GabpError) -> Self {
        ErrorObject::new(err.code(), err.to_string())
    }
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    /// Build a request with a fresh id
    pub fn request(method: impl Into<String>, params: Value) -> Self {
        Message::Request {
            v: PROTOCOL_VERSION.to_string(),
            id: fresh_id(),
            method: method.into(),
            params,
        }
    }

    /// Build a request echoing a caller-chosen id
    pub fn request_with_id(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Message::Request {
            v: PROTOCOL_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Successful response to the request with the given id
    pub fn response_ok(request_id: &str, result: Value) -> Self {
        Message::Response {
            v: PROTOCOL_VERSION.to_string(),
            id: request_id.to_string(),
            result: Some(result),
            error: None,
        }
    }

    /// Failed response to the request with the given id
    pub fn response_err(request_id: &str, error: ErrorObject) -> Self {
        Message::Response {
            v: PROTOCOL_VERSION.to_string(),
            id: request_id.to_string(),
            result: None,
            error: Some(error),
        }
    }

    /// Event on a channel with a fresh id
    pub fn event(
        channel: impl Into<String>,
        seq: u64,
        payload: Value,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Message::Event {
            v: PROTOCOL_VERSION.to_string(),
            id: fresh_id(),
            channel: channel.into(),
            seq,
            payload,
            timestamp,
        }
    }

    /// The envelope id
    pub fn id(&self) -> &str {
        match self {
            Message::Request { id, .. }
            | Message::Response { id, .. }
            | Message::Event { id, .. } => id,
        }
    }

    /// The envelope protocol version
    pub fn version(&self) -> &str {
        match self {
            Message::Request { v, .. } | Message::Response { v, .. } | Message::Event { v, .. } => {
                v
            }
        }
    }
}
