// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Pagebridge — bidirectional RPC between native code and a web page.
//!
//! Native code calls into the page with [`BridgeSession::evaluate`] and gets
//! a future back; the page calls native handlers registered with
//! [`BridgeSession::expose`] through `window.<namespace>.call(..)` and gets a
//! promise back. All engine work is funnelled onto the UI thread, results are
//! matched to calls by id, and closing a session settles everything still in
//! flight.

pub mod args;
pub mod correlation;
pub mod dispatcher;
pub mod factory;
mod finite;
pub mod harness;
pub mod injector;
pub mod registry;
pub mod runtime;
pub mod serializer;
pub mod session;

pub use args::{EncodeArgs, FromArgs, IntoReply, Json};
pub use correlation::{CallResult, CorrelationTable, Pending, ResultHandle};
pub use dispatcher::Dispatcher;
pub use factory::{SessionFactory, SessionInfo};
pub use injector::ScriptInjector;
pub use registry::{DeferredHandler, Dispatch, FunctionRegistry, Responder, SyncHandler};
pub use serializer::{JsonSerializer, Serializer};
pub use session::{BridgeSession, SessionBuilder};

pub use pagebridge_core::{
    BridgeConfig, BridgeError, CallError, DuplicatePolicy, ErrorKind, FrameScope, LoadTime,
    ScriptEntry, SessionId, SessionState,
};
