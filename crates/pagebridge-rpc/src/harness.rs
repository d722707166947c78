// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A session on the headless engine, with the caller playing the page.
//
// Scripts native posts are read back from the engine transcript; page posts
// are encoded with the JSON wire format and delivered on the UI thread.

use std::sync::Arc;

use pagebridge_core::config::BridgeConfig;
use pagebridge_core::error::Result;
use pagebridge_core::types::{CallId, Envelope};
use pagebridge_engine::HeadlessEngine;
use serde_json::Value;

use crate::correlation::CallResult;
use crate::runtime::{extract_received, parse_evaluate};
use crate::serializer::{JsonSerializer, Serializer};
use crate::session::BridgeSession;

pub struct HeadlessPage {
    pub engine: Arc<HeadlessEngine>,
    pub session: BridgeSession,
    wire: JsonSerializer,
}

impl HeadlessPage {
    pub fn open(config: BridgeConfig) -> Result<Self> {
        let engine = Arc::new(HeadlessEngine::new()?);
        let session = BridgeSession::builder(engine.clone())
            .config(config)
            .build()?;
        Ok(Self {
            engine,
            session,
            wire: JsonSerializer,
        })
    }

    /// Post raw text from the page and wait until native has handled it.
    pub fn post(&self, text: &str) -> Result<()> {
        self.engine.deliver(text)?;
        self.engine.flush()
    }

    /// The page calls native `name`.
    pub fn call(&self, id: u64, name: &str, args: &[Value]) -> Result<()> {
        let text = self.wire.encode_call(CallId(id), name, args)?;
        self.post(&text)
    }

    /// The page answers native evaluate call `id`.
    pub fn reply(&self, id: CallId, payload: CallResult) -> Result<()> {
        let text = self.wire.encode_result(id, &payload)?;
        self.post(&text)
    }

    /// Wire text of every result delivered to the page since the last drain.
    pub fn take_wire_results(&self) -> Result<Vec<String>> {
        self.engine.flush()?;
        let namespace = &self.session.config().namespace;
        Ok(self
            .engine
            .take_transcript()
            .iter()
            .filter_map(|script| extract_received(namespace, script))
            .collect())
    }

    pub fn take_results(&self) -> Result<Vec<Envelope>> {
        self.take_wire_results()?
            .iter()
            .map(|text| self.wire.decode(text))
            .collect()
    }

    /// Evaluate scripts posted since the last drain, as `(id, expression)`.
    pub fn take_evaluations(&self) -> Result<Vec<(CallId, String)>> {
        self.engine.flush()?;
        let namespace = &self.session.config().namespace;
        Ok(self
            .engine
            .take_transcript()
            .iter()
            .filter_map(|script| parse_evaluate(namespace, script))
            .collect())
    }
}
