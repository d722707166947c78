// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Headless self-check: drives real sessions through the headless engine,
// with this module playing the page, and reports each scenario's outcome.

use std::time::Duration;

use pagebridge_core::error::Result;
use pagebridge_core::types::{CallId, Envelope};
use pagebridge_rpc::harness::HeadlessPage;
use pagebridge_rpc::{BridgeConfig, CallError, ErrorKind, JsonSerializer, ScriptEntry, Serializer};
use serde_json::{Value, json};
use tracing::{error, info};

type Outcome = std::result::Result<(), String>;

/// One scenario's result.
#[derive(Debug)]
pub struct Check {
    pub name: &'static str,
    pub outcome: Outcome,
}

impl Check {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Run every scenario with `config`.
pub fn run(config: &BridgeConfig) -> Result<Vec<Check>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let scenarios: [(&'static str, fn(&BridgeConfig) -> Result<Outcome>); 7] = [
        ("wire round trip", round_trip),
        ("page calls exposed function", page_calls_add),
        ("missing function reported", missing_function),
        ("evaluate pending until close", pending_until_close),
        ("results matched by id", out_of_order),
        ("once function answers once", once_semantics),
        ("persistent scripts survive navigation", persistent_scripts),
    ];

    let mut checks = Vec::new();
    for (name, scenario) in scenarios {
        checks.push(record(name, scenario(config)?));
    }
    checks.push(record("ready event", runtime.block_on(ready_event(config))?));
    Ok(checks)
}

fn record(name: &'static str, outcome: Outcome) -> Check {
    match &outcome {
        Ok(()) => info!(check = name, "passed"),
        Err(reason) => error!(check = name, %reason, "failed"),
    }
    Check { name, outcome }
}

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Outcome {
    if condition { Ok(()) } else { Err(reason()) }
}

fn round_trip(_config: &BridgeConfig) -> Result<Outcome> {
    let wire = JsonSerializer;
    for value in [
        Value::Null,
        json!(true),
        json!(-12),
        json!(0.1 + 0.2),
        json!("line\nbreak \"quoted\" ✓"),
        json!([1, [2, [3]], {"k": null}]),
    ] {
        let text = wire.encode_result(CallId(1), &Ok(value.clone()))?;
        let decoded = wire.decode(&text)?;
        let expected = Envelope::Result {
            id: CallId(1),
            payload: Ok(value),
        };
        if decoded != expected {
            return Ok(Err(format!("{text} decoded as {decoded:?}")));
        }
    }
    Ok(Ok(()))
}

fn page_calls_add(config: &BridgeConfig) -> Result<Outcome> {
    let page = HeadlessPage::open(config.clone())?;
    page.session.expose("add", |a: i64, b: i64| a + b, false)?;
    page.call(1, "add", &[json!(2), json!(3)])?;

    let results = page.take_wire_results()?;
    let expected = r#"{"type":"result","id":1,"ok":true,"value":5}"#;
    Ok(ensure(results == [expected], || format!("got {results:?}")))
}

fn missing_function(config: &BridgeConfig) -> Result<Outcome> {
    let page = HeadlessPage::open(config.clone())?;
    page.call(7, "missing", &[])?;

    let results = page.take_wire_results()?;
    let expected =
        r#"{"type":"result","id":7,"ok":false,"error":{"kind":"UnknownFunction","message":"missing"}}"#;
    Ok(ensure(results == [expected], || format!("got {results:?}")))
}

fn pending_until_close(config: &BridgeConfig) -> Result<Outcome> {
    let page = HeadlessPage::open(config.clone())?;
    let mut pending = page.session.evaluate::<i64>("1+1", ())?;
    page.take_evaluations()?;

    if pending.try_result().is_some() {
        return Ok(Err("settled without a reply".into()));
    }
    page.session.close();
    let result = pending.wait();
    Ok(ensure(result == Err(CallError::session_closed()), || {
        format!("settled as {result:?}")
    }))
}

fn out_of_order(config: &BridgeConfig) -> Result<Outcome> {
    let page = HeadlessPage::open(config.clone())?;
    let mut a = page.session.evaluate::<String>("'a'", ())?;
    let b = page.session.evaluate::<String>("'b'", ())?;
    let posted = page.take_evaluations()?;
    if posted.len() != 2 {
        return Ok(Err(format!("expected two evaluate scripts, got {posted:?}")));
    }

    page.reply(b.id(), Ok(json!("b")))?;
    if a.try_result().is_some() {
        return Ok(Err("first call settled by the second reply".into()));
    }
    page.reply(a.id(), Ok(json!("a")))?;

    let (a, b) = (a.wait(), b.wait());
    Ok(ensure(
        a == Ok("a".to_string()) && b == Ok("b".to_string()),
        || format!("a = {a:?}, b = {b:?}"),
    ))
}

fn once_semantics(config: &BridgeConfig) -> Result<Outcome> {
    let page = HeadlessPage::open(config.clone())?;
    page.session.expose("confirm", || true, true)?;
    page.call(1, "confirm", &[])?;
    page.call(2, "confirm", &[])?;

    let results = page.take_results()?;

    let kinds: Vec<Option<ErrorKind>> = results
        .iter()
        .map(|envelope| match envelope {
            Envelope::Result { payload: Err(e), .. } => Some(e.kind),
            _ => None,
        })
        .collect();
    Ok(ensure(
        kinds == [None, Some(ErrorKind::UnknownFunction)],
        || format!("got {results:?}"),
    ))
}

fn persistent_scripts(config: &BridgeConfig) -> Result<Outcome> {
    let page = HeadlessPage::open(config.clone())?;
    page.session.inject(ScriptEntry::creation("A();"))?;
    page.session.inject(ScriptEntry::creation("B();"))?;

    for navigation in 1..=2 {
        page.engine.navigate()?;
        page.engine.flush()?;
        let transcript = page.engine.take_transcript();
        let Some(blob) = transcript.first() else {
            return Ok(Err(format!("navigation {navigation}: nothing injected")));
        };
        match (blob.find("A();"), blob.find("B();")) {
            (Some(a), Some(b)) if a < b => {}
            _ => return Ok(Err(format!("navigation {navigation}: A then B missing"))),
        }
    }
    Ok(Ok(()))
}

async fn ready_event(config: &BridgeConfig) -> Result<Outcome> {
    let page = HeadlessPage::open(config.clone())?;
    let mut ready = page.session.ready();
    page.post(r#"{"type":"ready"}"#)?;

    let waited = tokio::time::timeout(Duration::from_secs(2), ready.wait_for(|r| *r)).await;
    Ok(ensure(matches!(waited, Ok(Ok(_))), || {
        "ready flag never set".to_string()
    }))
}
