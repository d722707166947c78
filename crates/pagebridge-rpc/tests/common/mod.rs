// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test harness: `HeadlessPage` with panicking accessors.

#![allow(dead_code)]

use std::ops::Deref;
use std::time::{Duration, Instant};

use pagebridge_core::types::{CallId, Envelope};
use pagebridge_rpc::harness::HeadlessPage;
use pagebridge_rpc::{BridgeConfig, CallResult};
use serde_json::Value;

pub struct Page(HeadlessPage);

impl Deref for Page {
    type Target = HeadlessPage;

    fn deref(&self) -> &HeadlessPage {
        &self.0
    }
}

impl Page {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        Self(HeadlessPage::open(config).expect("headless page"))
    }

    pub fn post(&self, text: &str) {
        self.0.post(text).expect("post");
    }

    pub fn call(&self, id: u64, name: &str, args: Vec<Value>) {
        self.0.call(id, name, &args).expect("call");
    }

    pub fn reply(&self, id: CallId, payload: CallResult) {
        self.0.reply(id, payload).expect("reply");
    }

    pub fn take_wire_results(&self) -> Vec<String> {
        self.0.take_wire_results().expect("wire results")
    }

    pub fn take_results(&self) -> Vec<Envelope> {
        self.0.take_results().expect("native sent valid envelopes")
    }

    /// Poll for `count` results, for handlers that answer from other threads.
    pub fn wait_for_results(&self, count: usize) -> Vec<Envelope> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut results = Vec::new();
        while results.len() < count && Instant::now() < deadline {
            results.extend(self.take_results());
            std::thread::sleep(Duration::from_millis(5));
        }
        results
    }

    pub fn take_evaluations(&self) -> Vec<(CallId, String)> {
        self.0.take_evaluations().expect("evaluations")
    }
}
