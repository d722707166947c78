// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge session: one page, one transport, one lifecycle.
//
// A session owns its correlation table, function registry and script
// injector. Engine callbacks hold only a weak reference, so dropping the last
// `BridgeSession` handle closes the session.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use pagebridge_core::config::BridgeConfig;
use pagebridge_core::error::{BridgeError, CallError, ErrorKind, Result};
use pagebridge_core::types::{CallId, Envelope, LoadTime, ScriptEntry, SessionId, SessionState};
use pagebridge_engine::Engine;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace, warn};

use crate::args::{EncodeArgs, FromArgs};
use crate::correlation::{CallResult, CorrelationTable, Pending, ResultHandle};
use crate::dispatcher::Dispatcher;
use crate::injector::ScriptInjector;
use crate::registry::{DeferredHandler, Dispatch, FunctionRegistry, ReplySink, SyncHandler};
use crate::runtime;
use crate::serializer::{JsonSerializer, Serializer};

type ReadyListener = Box<dyn FnOnce() + Send + 'static>;

/// Configures and starts a [`BridgeSession`].
pub struct SessionBuilder {
    engine: Arc<dyn Engine>,
    config: BridgeConfig,
    serializer: Arc<dyn Serializer>,
    scripts: Vec<ScriptEntry>,
}

impl SessionBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Add a user script present from the first document on.
    pub fn script(mut self, entry: ScriptEntry) -> Self {
        self.scripts.push(entry);
        self
    }

    /// Attach to the engine and enter `Active`.
    ///
    /// Engines that can run scripts ahead of page code take the bridge
    /// runtime and the persistent creation scripts here; attach the session
    /// before the engine builds its page.
    #[instrument(skip_all, fields(namespace = %self.config.namespace))]
    pub fn build(self) -> Result<BridgeSession> {
        let SessionBuilder {
            engine,
            config,
            serializer,
            scripts,
        } = self;

        if !config.namespace_is_valid() {
            return Err(BridgeError::Config(format!(
                "namespace `{}` is not a script identifier",
                config.namespace
            )));
        }

        let mut injector = ScriptInjector::new();
        injector.add_pinned(ScriptEntry::creation(runtime::bootstrap_script(
            &config,
            serializer.as_ref(),
            engine.page_post_function(),
        )));
        for entry in scripts {
            injector.add(entry);
        }
        let preloaded = injector.preload(|source| engine.preload_script(source));

        let (ready, _) = watch::channel(false);
        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            id: SessionId::new(),
            created_at: Utc::now(),
            dispatcher: Dispatcher::new(Arc::clone(&engine)),
            registry: FunctionRegistry::new(config.duplicate_expose),
            engine,
            config,
            serializer,
            state: Mutex::new(SessionState::Uninitialized),
            correlation: Mutex::new(CorrelationTable::new()),
            injector: Mutex::new(injector),
            ready,
            ready_listeners: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&inner);
        inner.engine.on_text(Arc::new(move |text: String| {
            if let Some(inner) = weak.upgrade() {
                inner.on_message(&text);
            }
        }));
        let weak = Arc::downgrade(&inner);
        inner.engine.on_document_event(Arc::new(move |timing: LoadTime| {
            if let Some(inner) = weak.upgrade() {
                inner.on_document_event(timing);
            }
        }));

        *inner.state.lock().expect("state lock poisoned") = SessionState::Active;
        info!(
            session = %inner.id,
            engine = inner.engine.engine_name(),
            namespace = %inner.config.namespace,
            preloaded,
            "bridge session active"
        );
        Ok(BridgeSession { inner })
    }
}

/// Handle to a bridge session. Clones share the session.
#[derive(Clone)]
pub struct BridgeSession {
    inner: Arc<Inner>,
}

struct Inner {
    me: Weak<Inner>,
    id: SessionId,
    created_at: DateTime<Utc>,
    config: BridgeConfig,
    engine: Arc<dyn Engine>,
    serializer: Arc<dyn Serializer>,
    dispatcher: Dispatcher,
    state: Mutex<SessionState>,
    correlation: Mutex<CorrelationTable>,
    registry: FunctionRegistry,
    injector: Mutex<ScriptInjector>,
    ready: watch::Sender<bool>,
    ready_listeners: Mutex<Vec<ReadyListener>>,
}

impl BridgeSession {
    pub fn builder(engine: Arc<dyn Engine>) -> SessionBuilder {
        SessionBuilder {
            engine,
            config: BridgeConfig::default(),
            serializer: Arc::new(JsonSerializer),
            scripts: Vec::new(),
        }
    }

    /// A session with the default configuration and JSON wire format.
    pub fn new(engine: Arc<dyn Engine>) -> Result<Self> {
        Self::builder(engine).build()
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().expect("state lock poisoned")
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Evaluate `template` in the page with `args` substituted for its `{}`
    /// placeholders.
    ///
    /// Returns as soon as the script is queued. Argument encoding and
    /// template errors are reported here; everything later arrives through
    /// the returned future.
    #[instrument(skip_all, fields(session = %self.inner.id))]
    pub fn evaluate<T: DeserializeOwned>(
        &self,
        template: &str,
        args: impl EncodeArgs,
    ) -> Result<Pending<T>> {
        let args = args.encode_args()?;
        self.inner.evaluate(template, &args).map(Pending::new)
    }

    /// Run `code` in the current document without waiting for a result.
    pub fn execute(&self, code: impl Into<String>) -> Result<()> {
        self.inner.ensure_active()?;
        self.inner.post_script(code.into())
    }

    /// Expose a synchronous handler to the page as `name`.
    pub fn expose<Args, H>(&self, name: impl Into<String>, handler: H, once: bool) -> Result<()>
    where
        Args: FromArgs,
        H: SyncHandler<Args>,
    {
        self.inner.ensure_active()?;
        self.inner.registry.expose(name, handler, once)
    }

    /// Expose a handler that answers through a [`crate::Responder`].
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
        self.inner.ensure_active()?;
        self.inner.registry.expose_deferred(name, handler, once)
    }

    pub fn unexpose(&self, name: &str) -> bool {
        self.inner.registry.unexpose(name)
    }

    /// Names currently exposed to the page.
    pub fn exposed(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    /// Add a user script. Returns `false` for a duplicate.
    pub fn inject(&self, entry: ScriptEntry) -> Result<bool> {
        self.inner.ensure_active()?;
        let mut injector = self.inner.injector.lock().expect("injector lock poisoned");
        let added = injector.add(entry);
        if added {
            injector.preload(|source| self.inner.engine.preload_script(source));
        }
        Ok(added)
    }

    /// Remove user scripts matching `predicate`. The bridge runtime stays.
    ///
    /// A script the engine already took as a preload keeps running in the
    /// documents it creates.
    pub fn uninject<P>(&self, predicate: P) -> usize
    where
        P: FnMut(&ScriptEntry) -> bool,
    {
        self.inner
            .injector
            .lock()
            .expect("injector lock poisoned")
            .remove(predicate)
    }

    /// Inbound transport callback. Normally driven by the engine.
    pub fn on_message(&self, raw: &str) {
        self.inner.on_message(raw);
    }

    /// Document lifecycle callback. Normally driven by the engine.
    pub fn on_document_event(&self, timing: LoadTime) {
        self.inner.on_document_event(timing);
    }

    /// Whether the page runtime has reported ready at least once.
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Watch the ready flag, e.g. `session.ready().wait_for(|r| *r).await`.
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.inner.ready.subscribe()
    }

    /// Run `listener` once the runtime is ready; immediately if it already is.
    pub fn on_ready(&self, listener: impl FnOnce() + Send + 'static) {
        let mut listeners = self
            .inner
            .ready_listeners
            .lock()
            .expect("ready listeners lock poisoned");
        if *self.inner.ready.borrow() {
            drop(listeners);
            listener();
        } else {
            listeners.push(Box::new(listener));
        }
    }

    /// Native→page calls still waiting for a result.
    pub fn pending_calls(&self) -> usize {
        self.inner
            .correlation
            .lock()
            .expect("correlation lock poisoned")
            .len()
    }

    /// Tear down the session. Idempotent.
    ///
    /// Every pending call resolves with `SessionClosed` before this returns.
    #[instrument(skip_all, fields(session = %self.inner.id))]
    pub fn close(&self) {
        self.inner.close();
    }
}

impl fmt::Debug for BridgeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSession")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("engine", &self.inner.engine.engine_name())
            .finish()
    }
}

impl Inner {
    fn ensure_active(&self) -> Result<()> {
        match *self.state.lock().expect("state lock poisoned") {
            SessionState::Active => Ok(()),
            _ => Err(BridgeError::SessionClosed),
        }
    }

    fn evaluate(&self, template: &str, args: &[Value]) -> Result<ResultHandle> {
        self.ensure_active()?;
        let expression = runtime::format_expression(self.serializer.as_ref(), template, args)?;

        let (id, handle) = self
            .correlation
            .lock()
            .expect("correlation lock poisoned")
            .register();
        let script = runtime::evaluate_script(&self.config.namespace, id, &expression);
        trace!(session = %self.id, %id, "evaluate queued");

        let engine = Arc::clone(&self.engine);
        let me = self.me.clone();
        let queued = self.dispatcher.run_on_ui(move || {
            if let Err(e) = engine.post_text(&script) {
                warn!(%id, error = %e, "failed to post evaluate script");
                if let Some(inner) = me.upgrade() {
                    inner.resolve(id, Err(CallError::handler_failed(e.to_string())));
                }
            }
        });
        if let Err(e) = queued {
            self.resolve(id, Err(e.into_call_error()));
        }
        Ok(handle)
    }

    fn resolve(&self, id: CallId, result: CallResult) -> bool {
        self.correlation
            .lock()
            .expect("correlation lock poisoned")
            .resolve(id, result)
    }

    fn post_script(&self, script: String) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        self.dispatcher.run_on_ui(move || {
            if let Err(e) = engine.post_text(&script) {
                warn!(error = %e, "failed to post script");
            }
        })
    }

    fn on_message(&self, raw: &str) {
        if self.ensure_active().is_err() {
            trace!(session = %self.id, "message after close discarded");
            return;
        }
        if raw.len() > self.config.max_message_bytes {
            warn!(
                session = %self.id,
                len = raw.len(),
                limit = self.config.max_message_bytes,
                "oversized message dropped"
            );
            return;
        }

        let envelope = match self.serializer.decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(session = %self.id, error = %e, "malformed message dropped");
                return;
            }
        };
        if self.config.log_messages {
            debug!(session = %self.id, ?envelope, "inbound envelope");
        }

        match envelope {
            Envelope::Call { id, name, args } => {
                trace!(session = %self.id, %id, %name, "page call");
                match self.registry.dispatch(id, &name, args, self.reply_sink()) {
                    Dispatch::Complete(result) => self.post_result(id, result),
                    Dispatch::Deferred => trace!(%id, %name, "call deferred"),
                }
            }
            Envelope::Result { id, payload } => {
                self.resolve(id, payload);
            }
            Envelope::Ready => self.mark_ready(),
        }
    }

    fn reply_sink(&self) -> ReplySink {
        let me = self.me.clone();
        Arc::new(move |id: CallId, result: CallResult| match me.upgrade() {
            Some(inner) => inner.post_result(id, result),
            None => debug!(%id, "reply after session drop discarded"),
        })
    }

    fn post_result(&self, id: CallId, result: CallResult) {
        let encoded = self.serializer.encode_result(id, &result).or_else(|e| {
            let fallback = Err(CallError::new(ErrorKind::Unsupported, e.to_string()));
            self.serializer.encode_result(id, &fallback)
        });
        let encoded = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(session = %self.id, %id, error = %e, "result could not be encoded");
                return;
            }
        };

        let script = runtime::receive_script(&self.config.namespace, &encoded);
        if let Err(e) = self.post_script(script) {
            debug!(session = %self.id, %id, error = %e, "result not delivered");
        }
    }

    fn on_document_event(&self, timing: LoadTime) {
        if self.ensure_active().is_err() {
            return;
        }
        let source = self
            .injector
            .lock()
            .expect("injector lock poisoned")
            .materialize(timing);
        debug!(session = %self.id, %timing, injected = source.is_some(), "document event");
        if let Some(source) = source {
            if let Err(e) = self.post_script(source) {
                warn!(session = %self.id, %timing, error = %e, "script injection failed");
            }
        }
    }

    fn mark_ready(&self) {
        let first = !self.ready.send_replace(true);
        debug!(session = %self.id, first, "page runtime ready");
        if first {
            let listeners = std::mem::take(
                &mut *self
                    .ready_listeners
                    .lock()
                    .expect("ready listeners lock poisoned"),
            );
            for listener in listeners {
                listener();
            }
        }
    }

    fn close(&self) {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            match *state {
                SessionState::Closing | SessionState::Closed => return,
                SessionState::Uninitialized | SessionState::Active => {
                    *state = SessionState::Closing
                }
            }
        }

        self.engine.clear_text_callback();
        let cancelled = self
            .correlation
            .lock()
            .expect("correlation lock poisoned")
            .cancel_all(CallError::session_closed());
        self.registry.clear();
        self.dispatcher.shutdown();
        self.ready_listeners
            .lock()
            .expect("ready listeners lock poisoned")
            .clear();

        *self.state.lock().expect("state lock poisoned") = SessionState::Closed;
        info!(session = %self.id, cancelled, "bridge session closed");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.close();
    }
}
