// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native web engine via wry (WebView2 / WKWebView / WebKitGTK) and tao.
//
// The `WebView` handle is owned by the event-loop thread and never leaves it.
// Every engine operation is turned into a `UserEvent` and pushed through the
// loop's proxy; the embedder forwards those events to `WryEngine::handle_event`
// from its event loop. Page messages arrive through wry's IPC handler
// (`window.ipc.postMessage`), lifecycle through the page-load handler.
//
// Scripts preloaded before `attach` become wry initialization scripts and run
// ahead of page code in every document. wry takes those only at build time,
// so creation-time scripts added afterwards are applied once the new document
// has loaded, just before the ready event.

#![cfg(feature = "wry")]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use ::tao::event_loop::{EventLoop, EventLoopProxy};
use ::wry::{PageLoadEvent, WebView, WebViewBuilder};
use pagebridge_core::error::{BridgeError, Result};
use pagebridge_core::types::LoadTime;
use tracing::{debug, trace, warn};

use crate::traits::*;

/// Events the engine sends to the embedder's event loop.
pub enum UserEvent {
    /// Run a task on the UI thread.
    Run(UiTask),
    /// Evaluate a script in the webview.
    Evaluate(String),
}

#[derive(Default)]
struct Shared {
    text: Mutex<Option<TextCallback>>,
    document: Mutex<Option<DocumentCallback>>,
}

/// Engine backed by a wry webview living on the tao event-loop thread.
pub struct WryEngine {
    proxy: Mutex<EventLoopProxy<UserEvent>>,
    ui_thread: ThreadId,
    closed: AtomicBool,
    attached: AtomicBool,
    preloads: Mutex<Vec<String>>,
    shared: Arc<Shared>,
}

impl WryEngine {
    /// Create the engine for `event_loop`.
    ///
    /// Must be called on the thread that owns the event loop.
    pub fn new(event_loop: &EventLoop<UserEvent>) -> Self {
        Self {
            proxy: Mutex::new(event_loop.create_proxy()),
            ui_thread: std::thread::current().id(),
            closed: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            preloads: Mutex::new(Vec::new()),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Wire the preloaded scripts plus the IPC and page-load handlers into a
    /// webview builder. Later preloads are refused.
    pub fn attach<'a>(&self, mut builder: WebViewBuilder<'a>) -> WebViewBuilder<'a> {
        self.attached.store(true, Ordering::SeqCst);
        let preloads = std::mem::take(&mut *self.preloads.lock().expect("preloads lock poisoned"));
        debug!(count = preloads.len(), "initialization scripts installed");
        for script in &preloads {
            builder = builder.with_initialization_script(script);
        }

        let text = Arc::clone(&self.shared);
        let document = Arc::clone(&self.shared);

        builder
            .with_ipc_handler(move |request: ::wry::http::Request<String>| {
                let callback = text.text.lock().expect("text callback lock poisoned").clone();
                match callback {
                    Some(callback) => callback(request.into_body()),
                    None => trace!("page message discarded, no listener"),
                }
            })
            .with_on_page_load_handler(move |event, url| {
                let finished = matches!(event, PageLoadEvent::Finished);
                debug!(%url, finished, "page load event");
                // At `Started` the outgoing document is still the one scripts reach.
                if !finished {
                    return;
                }
                let callback = document
                    .document
                    .lock()
                    .expect("document callback lock poisoned")
                    .clone();
                if let Some(callback) = callback {
                    callback(LoadTime::Creation);
                    callback(LoadTime::Ready);
                }
            })
    }

    /// Apply one event from the embedder's event loop.
    pub fn handle_event(&self, webview: &WebView, event: UserEvent) {
        match event {
            UserEvent::Run(task) => task(),
            UserEvent::Evaluate(script) => {
                if let Err(e) = webview.evaluate_script(&script) {
                    warn!(error = %e, "evaluate_script failed");
                }
            }
        }
    }

    /// Mark the event loop as gone; later operations fail with `SessionClosed`.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn send(&self, event: UserEvent) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::SessionClosed);
        }
        self.proxy
            .lock()
            .expect("proxy lock poisoned")
            .send_event(event)
            .map_err(|_| BridgeError::SessionClosed)
    }
}

impl Engine for WryEngine {
    fn engine_name(&self) -> &str {
        "wry"
    }

    fn page_post_function(&self) -> &str {
        "(text) => window.ipc.postMessage(text)"
    }
}

impl ScriptTransport for WryEngine {
    fn post_text(&self, script: &str) -> Result<()> {
        if !self.is_ui_thread() {
            return Err(BridgeError::Engine(
                "post_text must be called from the UI thread".into(),
            ));
        }
        self.send(UserEvent::Evaluate(script.to_owned()))
    }
}

impl MessageSource for WryEngine {
    fn on_text(&self, callback: TextCallback) {
        *self.shared.text.lock().expect("text callback lock poisoned") = Some(callback);
    }

    fn clear_text_callback(&self) {
        *self.shared.text.lock().expect("text callback lock poisoned") = None;
    }
}

impl UiThread for WryEngine {
    fn run_on_ui(&self, task: UiTask) -> Result<()> {
        self.send(UserEvent::Run(task))
    }

    fn is_ui_thread(&self) -> bool {
        std::thread::current().id() == self.ui_thread
    }
}

impl DocumentEvents for WryEngine {
    fn on_document_event(&self, callback: DocumentCallback) {
        *self
            .shared
            .document
            .lock()
            .expect("document callback lock poisoned") = Some(callback);
    }

    fn preload_script(&self, script: &str) -> bool {
        let mut preloads = self.preloads.lock().expect("preloads lock poisoned");
        if self.attached.load(Ordering::SeqCst) {
            return false;
        }
        preloads.push(script.to_owned());
        true
    }
}
