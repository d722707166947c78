// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Function registry for page→native calls.
//
// Handlers are ordinary closures. Their parameter list is bound from the
// call's argument values through `FromArgs`, and their return value goes back
// through `IntoReply`. Deferred handlers receive a `Responder` instead of
// returning, and may settle it later from any thread.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use pagebridge_core::config::DuplicatePolicy;
use pagebridge_core::error::{BridgeError, CallError, Result};
use pagebridge_core::types::CallId;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::args::{FromArgs, IntoReply};
use crate::correlation::CallResult;

/// Where a deferred handler's outcome is sent.
pub type ReplySink = Arc<dyn Fn(CallId, CallResult) + Send + Sync + 'static>;

/// Completion handle given to deferred handlers.
///
/// Settle it exactly once with [`Responder::resolve`] or
/// [`Responder::reject`]. Dropping it unsettled rejects the call.
pub struct Responder {
    id: CallId,
    sink: Option<ReplySink>,
}

impl Responder {
    pub(crate) fn new(id: CallId, sink: ReplySink) -> Self {
        Self {
            id,
            sink: Some(sink),
        }
    }

    /// Id of the page call being answered.
    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn resolve(self, value: impl IntoReply) {
        self.settle(value.into_reply());
    }

    /// Fail the call with `HandlerFailed`.
    pub fn reject(self, message: impl Into<String>) {
        self.settle(Err(CallError::handler_failed(message)));
    }

    pub fn settle(mut self, result: CallResult) {
        if let Some(sink) = self.sink.take() {
            sink(self.id, result);
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            debug!(id = %self.id, "responder dropped unsettled");
            sink(
                self.id,
                Err(CallError::handler_failed(
                    "handler dropped its responder without replying",
                )),
            );
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("id", &self.id)
            .field("settled", &self.sink.is_none())
            .finish()
    }
}

/// A handler that answers synchronously.
///
/// Implemented for `Fn(A1, .., An) -> R` with up to eight parameters, where
/// every `Ai` is deserializable and `R: IntoReply`.
pub trait SyncHandler<Args>: Send + Sync + 'static {
    fn invoke(&self, args: Args) -> CallResult;
}

/// A handler that answers through a [`Responder`].
///
/// Implemented for `Fn(A1, .., An, Responder)` with up to eight parameters.
pub trait DeferredHandler<Args>: Send + Sync + 'static {
    fn invoke(&self, args: Args, responder: Responder);
}

macro_rules! handler_impls {
    ($($T:ident),*) => {
        impl<F, R, $($T,)*> SyncHandler<($($T,)*)> for F
        where
            F: Fn($($T),*) -> R + Send + Sync + 'static,
            R: IntoReply,
            ($($T,)*): FromArgs,
        {
            #[allow(non_snake_case)]
            fn invoke(&self, ($($T,)*): ($($T,)*)) -> CallResult {
                (self)($($T),*).into_reply()
            }
        }

        impl<F, $($T,)*> DeferredHandler<($($T,)*)> for F
        where
            F: Fn($($T,)* Responder) + Send + Sync + 'static,
            ($($T,)*): FromArgs,
        {
            #[allow(non_snake_case)]
            fn invoke(&self, ($($T,)*): ($($T,)*), responder: Responder) {
                (self)($($T,)* responder)
            }
        }
    };
}

handler_impls!();
handler_impls!(A1);
handler_impls!(A1, A2);
handler_impls!(A1, A2, A3);
handler_impls!(A1, A2, A3, A4);
handler_impls!(A1, A2, A3, A4, A5);
handler_impls!(A1, A2, A3, A4, A5, A6);
handler_impls!(A1, A2, A3, A4, A5, A6, A7);
handler_impls!(A1, A2, A3, A4, A5, A6, A7, A8);

/// A bound call, ready to run outside the registry lock.
enum Invocation {
    Now(Box<dyn FnOnce() -> CallResult + Send>),
    Later(Box<dyn FnOnce(Responder) + Send>),
}

type Binder = Arc<dyn Fn(Vec<Value>) -> std::result::Result<Invocation, CallError> + Send + Sync>;

struct Registered {
    binder: Binder,
    once: bool,
}

/// Outcome of [`FunctionRegistry::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The call finished; post this result.
    Complete(CallResult),
    /// A deferred handler took the call; its responder posts the result.
    Deferred,
}

/// Name → handler map for one session.
pub struct FunctionRegistry {
    policy: DuplicatePolicy,
    functions: Mutex<HashMap<String, Registered>>,
}

impl FunctionRegistry {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            functions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a synchronous handler under `name`.
    ///
    /// With `once`, the entry is removed by its first successful bind.
    pub fn expose<Args, H>(&self, name: impl Into<String>, handler: H, once: bool) -> Result<()>
    where
        Args: FromArgs,
        H: SyncHandler<Args>,
    {
        let handler = Arc::new(handler);
        let binder: Binder = Arc::new(move |args| {
            let bound = Args::from_args(args)?;
            let handler = Arc::clone(&handler);
            Ok(Invocation::Now(Box::new(move || handler.invoke(bound))))
        });
        self.insert(name.into(), binder, once)
    }

    /// Register a handler that completes through a [`Responder`].
    pub fn expose_deferred<Args, H>(
        &self,
        name: impl Into<String>,
        handler: H,
        once: bool,
    ) -> Result<()>
    where
        Args: FromArgs,
        H: DeferredHandler<Args>,
    {
        let handler = Arc::new(handler);
        let binder: Binder = Arc::new(move |args| {
            let bound = Args::from_args(args)?;
            let handler = Arc::clone(&handler);
            Ok(Invocation::Later(Box::new(move |responder| {
                handler.invoke(bound, responder)
            })))
        });
        self.insert(name.into(), binder, once)
    }

    fn insert(&self, name: String, binder: Binder, once: bool) -> Result<()> {
        let mut functions = self.functions.lock().expect("registry lock poisoned");
        if functions.contains_key(&name) {
            match self.policy {
                DuplicatePolicy::Reject => return Err(BridgeError::DuplicateFunction(name)),
                DuplicatePolicy::Overwrite => debug!(%name, "replacing exposed function"),
            }
        }
        trace!(%name, once, "function exposed");
        functions.insert(name, Registered { binder, once });
        Ok(())
    }

    /// Remove `name`. Returns whether it was registered.
    pub fn unexpose(&self, name: &str) -> bool {
        self.functions
            .lock()
            .expect("registry lock poisoned")
            .remove(name)
            .is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions
            .lock()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.functions.lock().expect("registry lock poisoned").clear();
    }

    /// Bind and run one page call.
    ///
    /// Lookup, binding and `once` removal happen under the registry lock; the
    /// handler runs after the lock is released, so it may expose or unexpose
    /// functions itself. A panicking handler yields `HandlerFailed`.
    pub fn dispatch(&self, id: CallId, name: &str, args: Vec<Value>, sink: ReplySink) -> Dispatch {
        let invocation = {
            let mut functions = self.functions.lock().expect("registry lock poisoned");
            let Some(entry) = functions.get(name) else {
                return Dispatch::Complete(Err(CallError::unknown_function(name)));
            };
            let invocation = match (entry.binder)(args) {
                Ok(invocation) => invocation,
                Err(err) => return Dispatch::Complete(Err(err)),
            };
            if entry.once {
                functions.remove(name);
            }
            invocation
        };

        match invocation {
            Invocation::Now(run) => {
                let result = std::panic::catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|_| {
                    warn!(%id, %name, "handler panicked");
                    Err(panicked(name))
                });
                Dispatch::Complete(result)
            }
            Invocation::Later(run) => {
                let responder = Responder::new(id, sink);
                // An unwinding handler drops its responder, which rejects the call.
                if std::panic::catch_unwind(AssertUnwindSafe(move || run(responder))).is_err() {
                    warn!(%id, %name, "deferred handler panicked");
                }
                Dispatch::Deferred
            }
        }
    }
}

fn panicked(name: &str) -> CallError {
    CallError::handler_failed(format!("handler `{name}` panicked"))
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("policy", &self.policy)
            .field("names", &self.names())
            .finish()
    }
}
