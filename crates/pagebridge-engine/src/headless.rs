// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Headless engine for desktop/CI builds and tests.
//
// There is no script engine behind it: scripts posted to the "page" are
// recorded in a transcript, and the embedder plays the page's part by calling
// `deliver` (a page post) and `navigate`/`fire` (document lifecycle). The UI
// thread is real: a dedicated thread draining a FIFO channel, so thread
// affinity behaves as it does with a windowed backend.
//
// An engine built with `preloading` accepts preloaded scripts the way a
// webview takes initialization scripts: each creation event records them in
// the transcript before anything else.

use std::panic::AssertUnwindSafe;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};

use pagebridge_core::error::{BridgeError, Result};
use pagebridge_core::types::LoadTime;
use tracing::{debug, error, trace};

use crate::traits::*;

/// Page-side post function name installed by whoever drives the headless page.
pub const HEADLESS_POST_FUNCTION: &str = "window.__pagebridgeHeadlessPost";

#[derive(Default)]
struct Shared {
    text: Mutex<Option<TextCallback>>,
    document: Mutex<Option<DocumentCallback>>,
    transcript: Mutex<Vec<String>>,
    preloads: Mutex<Vec<String>>,
}

/// In-process engine with a real UI thread and a simulated page.
pub struct HeadlessEngine {
    queue: Mutex<Option<mpsc::Sender<UiTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    ui_thread: ThreadId,
    accepts_preload: bool,
    shared: Arc<Shared>,
}

impl HeadlessEngine {
    /// Spawn the UI thread and return the engine.
    pub fn new() -> Result<Self> {
        Self::spawn(false)
    }

    /// Like [`HeadlessEngine::new`], but accepting preloaded scripts.
    pub fn preloading() -> Result<Self> {
        Self::spawn(true)
    }

    fn spawn(accepts_preload: bool) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<UiTask>();
        let worker = std::thread::Builder::new()
            .name("pagebridge-ui".into())
            .spawn(move || {
                for task in rx {
                    if std::panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!("UI task panicked");
                    }
                }
                debug!("headless UI thread stopped");
            })?;

        Ok(Self {
            ui_thread: worker.thread().id(),
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            accepts_preload,
            shared: Arc::new(Shared::default()),
        })
    }

    /// Simulate the page posting `text` to native.
    pub fn deliver(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let shared = Arc::clone(&self.shared);
        self.run_on_ui(Box::new(move || {
            let callback = shared.text.lock().expect("text callback lock poisoned").clone();
            match callback {
                Some(callback) => callback(text),
                None => trace!("page message discarded, no listener"),
            }
        }))
    }

    /// Fire one document lifecycle event.
    pub fn fire(&self, timing: LoadTime) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        self.run_on_ui(Box::new(move || {
            if timing == LoadTime::Creation {
                let preloads = shared.preloads.lock().expect("preloads lock poisoned").clone();
                shared
                    .transcript
                    .lock()
                    .expect("transcript lock poisoned")
                    .extend(preloads);
            }
            let callback = shared
                .document
                .lock()
                .expect("document callback lock poisoned")
                .clone();
            if let Some(callback) = callback {
                callback(timing);
            }
        }))
    }

    /// Simulate a navigation: a fresh document is created, then becomes ready.
    pub fn navigate(&self) -> Result<()> {
        self.fire(LoadTime::Creation)?;
        self.fire(LoadTime::Ready)
    }

    /// Block until every task queued so far has run.
    ///
    /// A no-op when called from the UI thread itself.
    pub fn flush(&self) -> Result<()> {
        if self.is_ui_thread() {
            return Ok(());
        }
        let (tx, rx) = mpsc::sync_channel(1);
        self.run_on_ui(Box::new(move || {
            let _ = tx.send(());
        }))?;
        rx.recv().map_err(|_| BridgeError::SessionClosed)
    }

    /// Every script posted to the page so far, in order.
    pub fn transcript(&self) -> Vec<String> {
        self.shared
            .transcript
            .lock()
            .expect("transcript lock poisoned")
            .clone()
    }

    /// Drain the transcript.
    pub fn take_transcript(&self) -> Vec<String> {
        std::mem::take(&mut *self.shared.transcript.lock().expect("transcript lock poisoned"))
    }

    /// Stop the UI thread after it drains its queue.
    ///
    /// Later `run_on_ui` calls fail with `SessionClosed`.
    pub fn shutdown(&self) {
        let sender = self.queue.lock().expect("queue lock poisoned").take();
        drop(sender);
        if self.is_ui_thread() {
            return;
        }
        if let Some(worker) = self.worker.lock().expect("worker lock poisoned").take() {
            let _ = worker.join();
        }
    }
}

impl Drop for HeadlessEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Engine for HeadlessEngine {
    fn engine_name(&self) -> &str {
        "headless"
    }

    fn page_post_function(&self) -> &str {
        HEADLESS_POST_FUNCTION
    }
}

impl ScriptTransport for HeadlessEngine {
    fn post_text(&self, script: &str) -> Result<()> {
        if !self.is_ui_thread() {
            return Err(BridgeError::Engine(
                "post_text must be called from the UI thread".into(),
            ));
        }
        trace!(len = script.len(), "script posted to headless page");
        self.shared
            .transcript
            .lock()
            .expect("transcript lock poisoned")
            .push(script.to_owned());
        Ok(())
    }
}

impl MessageSource for HeadlessEngine {
    fn on_text(&self, callback: TextCallback) {
        *self.shared.text.lock().expect("text callback lock poisoned") = Some(callback);
    }

    fn clear_text_callback(&self) {
        *self.shared.text.lock().expect("text callback lock poisoned") = None;
    }
}

impl UiThread for HeadlessEngine {
    fn run_on_ui(&self, task: UiTask) -> Result<()> {
        let guard = self.queue.lock().expect("queue lock poisoned");
        let sender = guard.as_ref().ok_or(BridgeError::SessionClosed)?;
        sender.send(task).map_err(|_| BridgeError::SessionClosed)
    }

    fn is_ui_thread(&self) -> bool {
        std::thread::current().id() == self.ui_thread
    }
}

impl DocumentEvents for HeadlessEngine {
    fn on_document_event(&self, callback: DocumentCallback) {
        *self
            .shared
            .document
            .lock()
            .expect("document callback lock poisoned") = Some(callback);
    }

    fn preload_script(&self, script: &str) -> bool {
        if !self.accepts_preload {
            return false;
        }
        self.shared
            .preloads
            .lock()
            .expect("preloads lock poisoned")
            .push(script.to_owned());
        true
    }
}
