// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wire format for bridge envelopes.
//
// The rest of the bridge only sees `Envelope` and `Value`; everything that
// knows what the bytes look like lives behind the `Serializer` trait,
// including the page-side encode/decode functions the in-page runtime uses.

use pagebridge_core::error::{BridgeError, CallError, ErrorKind, Result};
use pagebridge_core::types::{CallId, Envelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Encodes and decodes envelopes for one wire format.
pub trait Serializer: Send + Sync {
    /// Encode a call envelope.
    fn encode_call(&self, id: CallId, name: &str, args: &[Value]) -> Result<String>;

    /// Encode a result envelope.
    fn encode_result(
        &self,
        id: CallId,
        payload: &std::result::Result<Value, CallError>,
    ) -> Result<String>;

    /// Encode a single value as a script literal, for expression templates.
    fn encode_value(&self, value: &Value) -> Result<String>;

    /// Decode one inbound message. Never panics on hostile input.
    fn decode(&self, raw: &str) -> Result<Envelope>;

    /// Script function expression turning a message object into wire text.
    fn page_encoder(&self) -> &str;

    /// Script function expression turning wire text into a message object.
    fn page_decoder(&self) -> &str;
}

/// JSON text envelopes.
///
/// ```text
/// {"type":"call","id":1,"name":"add","args":[2,3]}
/// {"type":"result","id":1,"ok":true,"value":5}
/// {"type":"result","id":7,"ok":false,"error":{"kind":"UnknownFunction","message":"missing"}}
/// {"type":"ready"}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Outgoing<'a> {
    Call {
        id: CallId,
        name: &'a str,
        args: &'a [Value],
    },
    Result {
        id: CallId,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<&'a Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<OutgoingError<'a>>,
    },
}

#[derive(Serialize)]
struct OutgoingError<'a> {
    kind: &'static str,
    message: &'a str,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Incoming {
    Call {
        id: CallId,
        name: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Result {
        id: CallId,
        ok: bool,
        #[serde(default)]
        value: Option<Value>,
        #[serde(default)]
        error: Option<IncomingError>,
    },
    Ready,
}

#[derive(Deserialize)]
struct IncomingError {
    kind: String,
    #[serde(default)]
    message: String,
}

impl IncomingError {
    /// Kinds the page invents are reported as handler failures rather than
    /// dropping the result, so the waiting call still settles.
    fn into_call_error(self) -> CallError {
        match self.kind.parse::<ErrorKind>() {
            Ok(kind) => CallError::new(kind, self.message),
            Err(()) => CallError::handler_failed(format!("{}: {}", self.kind, self.message)),
        }
    }
}

fn encode(message: &Outgoing<'_>) -> Result<String> {
    serde_json::to_string(message).map_err(|e| BridgeError::Unsupported(e.to_string()))
}

impl Serializer for JsonSerializer {
    fn encode_call(&self, id: CallId, name: &str, args: &[Value]) -> Result<String> {
        encode(&Outgoing::Call { id, name, args })
    }

    fn encode_result(
        &self,
        id: CallId,
        payload: &std::result::Result<Value, CallError>,
    ) -> Result<String> {
        let message = match payload {
            Ok(value) => Outgoing::Result {
                id,
                ok: true,
                value: Some(value),
                error: None,
            },
            Err(err) => Outgoing::Result {
                id,
                ok: false,
                value: None,
                error: Some(OutgoingError {
                    kind: err.kind.as_str(),
                    message: &err.message,
                }),
            },
        };
        encode(&message)
    }

    fn encode_value(&self, value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|e| BridgeError::Unsupported(e.to_string()))
    }

    fn decode(&self, raw: &str) -> Result<Envelope> {
        let incoming: Incoming =
            serde_json::from_str(raw).map_err(|e| BridgeError::MalformedMessage(e.to_string()))?;

        match incoming {
            Incoming::Call { id, name, args } => Ok(Envelope::Call { id, name, args }),
            Incoming::Result {
                id,
                ok: true,
                value,
                ..
            } => Ok(Envelope::Result {
                id,
                payload: Ok(value.unwrap_or(Value::Null)),
            }),
            Incoming::Result {
                id,
                ok: false,
                error: Some(error),
                ..
            } => Ok(Envelope::Result {
                id,
                payload: Err(error.into_call_error()),
            }),
            Incoming::Result { id, .. } => Err(BridgeError::MalformedMessage(format!(
                "failed result {id} carries no error"
            ))),
            Incoming::Ready => Ok(Envelope::Ready),
        }
    }

    fn page_encoder(&self) -> &str {
        "JSON.stringify"
    }

    fn page_decoder(&self) -> &str {
        "JSON.parse"
    }
}
