// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thread-affinity guard.
//
// Anything that touches the engine runs through here: inline when already on
// the UI thread, queued on the engine's FIFO otherwise.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pagebridge_core::error::{BridgeError, Result};
use pagebridge_engine::Engine;
use tracing::trace;

pub struct Dispatcher {
    engine: Arc<dyn Engine>,
    closed: AtomicBool,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            closed: AtomicBool::new(false),
        }
    }

    /// Run `task` on the UI thread without blocking the caller.
    ///
    /// Fails with `SessionClosed` after [`Dispatcher::shutdown`] or once the
    /// engine's UI thread is gone.
    pub fn run_on_ui<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::SessionClosed);
        }
        if self.engine.is_ui_thread() {
            task();
            return Ok(());
        }
        trace!("queueing task for the UI thread");
        self.engine.run_on_ui(Box::new(task))
    }

    pub fn is_ui_thread(&self) -> bool {
        self.engine.is_ui_thread()
    }

    /// Refuse all later submissions. Tasks already queued still run.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
