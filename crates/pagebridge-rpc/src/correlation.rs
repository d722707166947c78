// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Correlation table for native-originated calls.
//
// Every outgoing call gets a fresh id and a oneshot slot. The table owns the
// sending half; the caller only ever holds the receiving half, wrapped in a
// `ResultHandle`. A slot is consumed by the first resolve, so a second
// resolution for the same id cannot reach the caller.

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use pagebridge_core::error::CallError;
use pagebridge_core::types::CallId;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, trace};

/// Outcome delivered to a pending call.
pub type CallResult = Result<Value, CallError>;

/// Pending native→page calls keyed by correlation id.
///
/// Not internally synchronised; the owning session serialises access.
#[derive(Debug)]
pub struct CorrelationTable {
    next_id: u64,
    pending: BTreeMap<CallId, oneshot::Sender<CallResult>>,
    /// Set by `cancel_all`; later registrations settle immediately with it.
    cancelled: Option<CallError>,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: BTreeMap::new(),
            cancelled: None,
        }
    }

    /// Allocate the next id together with its result slot.
    pub fn register(&mut self) -> (CallId, ResultHandle) {
        let id = CallId(self.next_id);
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        match &self.cancelled {
            Some(error) => {
                let _ = tx.send(Err(error.clone()));
            }
            None => {
                self.pending.insert(id, tx);
            }
        }
        trace!(%id, "call registered");
        (id, ResultHandle { id, rx })
    }

    /// Deliver the result for `id`.
    ///
    /// Returns `false` (and changes nothing) when the id is unknown, already
    /// resolved, or was cancelled.
    pub fn resolve(&mut self, id: CallId, result: CallResult) -> bool {
        match self.pending.remove(&id) {
            Some(slot) => {
                if slot.send(result).is_err() {
                    trace!(%id, "caller dropped its handle before the result arrived");
                }
                true
            }
            None => {
                debug!(%id, "result for unknown or settled call ignored");
                false
            }
        }
    }

    /// Settle every pending call with `error` and refuse new slots.
    ///
    /// Returns the number of calls cancelled.
    pub fn cancel_all(&mut self, error: CallError) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for (_, slot) in pending {
            let _ = slot.send(Err(error.clone()));
        }
        self.cancelled = Some(error);
        count
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The caller's side of a pending call.
///
/// Await it, block on it with [`ResultHandle::wait`], or poll it with
/// [`ResultHandle::try_result`]. If the table is dropped without resolving
/// the call, the handle reports `SessionClosed`.
#[derive(Debug)]
pub struct ResultHandle {
    id: CallId,
    rx: oneshot::Receiver<CallResult>,
}

impl ResultHandle {
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Block the current thread until the call settles.
    ///
    /// Must not be called from inside an async runtime or from the UI thread
    /// that would deliver the result.
    pub fn wait(self) -> CallResult {
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(CallError::session_closed()))
    }

    /// Take the result if it has arrived. Returns `None` while pending.
    ///
    /// The result can be taken once; later calls report `SessionClosed`.
    pub fn try_result(&mut self) -> Option<CallResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(CallError::session_closed())),
        }
    }
}

impl Future for ResultHandle {
    type Output = CallResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(CallError::session_closed())))
    }
}

/// A pending call whose result converts into `T`.
///
/// A result that does not deserialize into `T` settles as `TypeMismatch`.
#[derive(Debug)]
pub struct Pending<T> {
    handle: ResultHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Pending<T> {
    pub(crate) fn new(handle: ResultHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> CallId {
        self.handle.id()
    }

    /// Block until the call settles. Same caveats as [`ResultHandle::wait`].
    pub fn wait(self) -> Result<T, CallError> {
        convert(self.handle.wait())
    }

    pub fn try_result(&mut self) -> Option<Result<T, CallError>> {
        self.handle.try_result().map(convert)
    }
}

impl<T: DeserializeOwned> Future for Pending<T> {
    type Output = Result<T, CallError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.handle).poll(cx).map(convert)
    }
}

fn convert<T: DeserializeOwned>(result: CallResult) -> Result<T, CallError> {
    let value = result?;
    serde_json::from_value(value)
        .map_err(|e| CallError::type_mismatch(format!("result: {e}")))
}
