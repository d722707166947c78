// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine-agnostic trait definitions for the capabilities the bridge consumes.
//
// The bridge core is written once against these traits. Backends differ in
// how they move strings (message channel, custom scheme, native messaging)
// but all of them present the same four capabilities.

use std::sync::Arc;

use pagebridge_core::error::Result;
use pagebridge_core::types::LoadTime;

/// A unit of work that must run on the UI thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Receives every string the page posts to native.
pub type TextCallback = Arc<dyn Fn(String) + Send + Sync + 'static>;

/// Receives document lifecycle events.
pub type DocumentCallback = Arc<dyn Fn(LoadTime) + Send + Sync + 'static>;

/// Unified engine interface grouping every capability the bridge needs.
pub trait Engine: ScriptTransport + MessageSource + UiThread + DocumentEvents + Send + Sync {
    /// Human-readable backend name (e.g. "wry", "headless").
    fn engine_name(&self) -> &str;

    /// Script expression evaluating to a function that posts one string to
    /// native, e.g. `window.ipc.postMessage.bind(window.ipc)`.
    fn page_post_function(&self) -> &str;
}

/// Native → page direction.
pub trait ScriptTransport {
    /// Execute `script` in the page's top-level context.
    ///
    /// Must be called on the UI thread.
    fn post_text(&self, script: &str) -> Result<()>;
}

/// Page → native direction.
pub trait MessageSource {
    /// Install the callback receiving page messages, replacing any previous one.
    ///
    /// The callback is invoked on the UI thread.
    fn on_text(&self, callback: TextCallback);

    /// Detach the callback; later page messages are discarded by the engine.
    fn clear_text_callback(&self);
}

/// Thread affinity primitives.
pub trait UiThread {
    /// Queue `task` on the UI thread. Tasks from one submitter run in
    /// submission order. Fails with `BridgeError::SessionClosed` once the
    /// UI thread is gone.
    fn run_on_ui(&self, task: UiTask) -> Result<()>;

    /// Whether the calling thread is the UI thread.
    fn is_ui_thread(&self) -> bool;
}

/// Document lifecycle notifications.
pub trait DocumentEvents {
    /// Install the callback fired at document creation and document ready.
    ///
    /// The creation event fires before page scripts run wherever the backend
    /// can guarantee it; the callback runs on the UI thread.
    fn on_document_event(&self, callback: DocumentCallback);

    /// Have `script` run at the start of every future document, before any
    /// page script.
    ///
    /// Returns `false` when the backend cannot take it (or can no longer);
    /// the caller then applies the script on the creation event instead.
    fn preload_script(&self, script: &str) -> bool;
}
