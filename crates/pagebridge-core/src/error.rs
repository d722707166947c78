// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pagebridge.
//
// Two layers: `ErrorKind` + `CallError` travel across the native/page boundary
// inside result envelopes, `BridgeError` is what local Rust callers see.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Call-level error taxonomy shared by both sides of the bridge.
///
/// Serialised on the wire by variant name (`"UnknownFunction"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// An inbound message could not be decoded.
    MalformedMessage,
    /// The call names a function that is not currently exposed.
    UnknownFunction,
    /// The argument list does not bind to the handler's parameters.
    TypeMismatch,
    /// The handler (or evaluated expression) reported a failure.
    HandlerFailed,
    /// A value has no wire representation.
    Unsupported,
    /// The session is not active, or was closed while the call was pending.
    SessionClosed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedMessage => "MalformedMessage",
            Self::UnknownFunction => "UnknownFunction",
            Self::TypeMismatch => "TypeMismatch",
            Self::HandlerFailed => "HandlerFailed",
            Self::Unsupported => "Unsupported",
            Self::SessionClosed => "SessionClosed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "MalformedMessage" => Ok(Self::MalformedMessage),
            "UnknownFunction" => Ok(Self::UnknownFunction),
            "TypeMismatch" => Ok(Self::TypeMismatch),
            "HandlerFailed" => Ok(Self::HandlerFailed),
            "Unsupported" => Ok(Self::Unsupported),
            "SessionClosed" => Ok(Self::SessionClosed),
            _ => Err(()),
        }
    }
}

/// A typed call failure, as delivered to a pending future or page promise.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CallError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CallError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_function(name: &str) -> Self {
        Self::new(ErrorKind::UnknownFunction, name)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn handler_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HandlerFailed, message)
    }

    pub fn session_closed() -> Self {
        Self::new(ErrorKind::SessionClosed, "session closed")
    }
}

/// Top-level error type for all local Pagebridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Wire --
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("value has no wire representation: {0}")]
    Unsupported(String),

    #[error("expression template expects {expected} argument(s), got {actual}")]
    TemplateArity { expected: usize, actual: usize },

    // -- Registry --
    #[error("function `{0}` is already exposed")]
    DuplicateFunction(String),

    // -- Lifecycle --
    #[error("session closed")]
    SessionClosed,

    #[error("call failed: {0}")]
    Call(#[from] CallError),

    // -- Engine / host --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// The call-level kind this error corresponds to, if any.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::MalformedMessage(_) => Some(ErrorKind::MalformedMessage),
            Self::Unsupported(_) | Self::TemplateArity { .. } => Some(ErrorKind::Unsupported),
            Self::SessionClosed => Some(ErrorKind::SessionClosed),
            Self::Call(err) => Some(err.kind),
            Self::DuplicateFunction(_)
            | Self::Config(_)
            | Self::Engine(_)
            | Self::Io(_)
            | Self::Serialization(_) => None,
        }
    }

    /// Convert into the error delivered to a pending call.
    pub fn into_call_error(self) -> CallError {
        match self {
            Self::Call(err) => err,
            Self::SessionClosed => CallError::session_closed(),
            other => {
                let kind = other.kind().unwrap_or(ErrorKind::HandlerFailed);
                CallError::new(kind, other.to_string())
            }
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_parse_back() {
        for kind in [
            ErrorKind::MalformedMessage,
            ErrorKind::UnknownFunction,
            ErrorKind::TypeMismatch,
            ErrorKind::HandlerFailed,
            ErrorKind::Unsupported,
            ErrorKind::SessionClosed,
        ] {
            assert_eq!(kind.as_str().parse::<ErrorKind>(), Ok(kind));
        }
        assert!("Bogus".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn kind_serializes_as_variant_name() {
        let json = serde_json::to_string(&ErrorKind::UnknownFunction).unwrap();
        assert_eq!(json, "\"UnknownFunction\"");
    }

    #[test]
    fn bridge_error_maps_to_call_error() {
        assert_eq!(
            BridgeError::SessionClosed.into_call_error(),
            CallError::session_closed()
        );

        let err = BridgeError::Unsupported("key must be a string".into()).into_call_error();
        assert_eq!(err.kind, ErrorKind::Unsupported);
        assert!(err.message.contains("key must be a string"));

        let inner = CallError::type_mismatch("argument 1: expected i64");
        assert_eq!(BridgeError::from(inner.clone()).into_call_error(), inner);
    }

    #[test]
    fn engine_errors_have_no_call_kind() {
        assert_eq!(BridgeError::Engine("gone".into()).kind(), None);
        assert_eq!(
            BridgeError::DuplicateFunction("add".into()).kind(),
            None
        );
    }
}
