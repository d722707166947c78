// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pagebridge message bridge.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CallError;

/// Correlation id pairing a call with its eventual result.
///
/// Native→page and page→native calls use independent id spaces; an id is only
/// meaningful together with the direction it travelled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single decoded wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Invoke `name` with `args` on the receiving side.
    Call {
        id: CallId,
        name: String,
        args: Vec<Value>,
    },
    /// Outcome of a call previously sent by the receiving side.
    Result {
        id: CallId,
        payload: Result<Value, CallError>,
    },
    /// The in-page runtime finished installing itself in the current document.
    Ready,
}

impl Envelope {
    /// Correlation id, if the envelope carries one.
    pub fn id(&self) -> Option<CallId> {
        match self {
            Self::Call { id, .. } | Self::Result { id, .. } => Some(*id),
            Self::Ready => None,
        }
    }
}

/// When in the document lifecycle a script is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadTime {
    /// Document created, before any page script runs.
    Creation,
    /// Document parsed and ready.
    Ready,
}

impl std::fmt::Display for LoadTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creation => f.write_str("creation"),
            Self::Ready => f.write_str("ready"),
        }
    }
}

/// Which frames a script runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameScope {
    TopOnly,
    AllFrames,
}

/// A script the injector keeps alive inside the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub code: String,
    pub timing: LoadTime,
    pub scope: FrameScope,
    /// Persistent scripts are re-applied on every document; others run once.
    pub persistent: bool,
}

impl ScriptEntry {
    /// Persistent, top-frame script applied at document creation.
    pub fn creation(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            timing: LoadTime::Creation,
            scope: FrameScope::TopOnly,
            persistent: true,
        }
    }

    /// Persistent, top-frame script applied once the document is ready.
    pub fn ready(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            timing: LoadTime::Ready,
            scope: FrameScope::TopOnly,
            persistent: true,
        }
    }

    pub fn with_scope(mut self, scope: FrameScope) -> Self {
        self.scope = scope;
        self
    }

    /// Mark the script as one-shot: removed after its first application.
    pub fn once(mut self) -> Self {
        self.persistent = false;
        self
    }

    /// Identity used for deduplication: code, timing and scope.
    pub fn same_identity(&self, other: &ScriptEntry) -> bool {
        self.code == other.code && self.timing == other.timing && self.scope == other.scope
    }
}

/// Lifecycle states of a bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Constructed, transport not yet attached.
    Uninitialized,
    /// Accepting calls in both directions.
    Active,
    /// Teardown in progress; new calls are refused.
    Closing,
    /// Terminal.
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_identity_ignores_persistence() {
        let a = ScriptEntry::creation("console.log(1)");
        let b = ScriptEntry::creation("console.log(1)").once();
        assert!(a.same_identity(&b));

        let c = ScriptEntry::ready("console.log(1)");
        assert!(!a.same_identity(&c));

        let d = ScriptEntry::creation("console.log(1)").with_scope(FrameScope::AllFrames);
        assert!(!a.same_identity(&d));
    }

    #[test]
    fn call_id_is_transparent_on_the_wire() {
        assert_eq!(serde_json::to_string(&CallId(42)).unwrap(), "42");
    }

    #[test]
    fn envelope_ids() {
        let call = Envelope::Call {
            id: CallId(3),
            name: "f".into(),
            args: vec![],
        };
        assert_eq!(call.id(), Some(CallId(3)));
        assert_eq!(Envelope::Ready.id(), None);
    }
}
