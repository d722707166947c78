// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end bridge behaviour against the headless engine.

mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use common::Page;
use pagebridge_core::types::{CallId, Envelope};
use pagebridge_rpc::{
    BridgeConfig, BridgeError, CallError, ErrorKind, LoadTime, Pending, Responder, ScriptEntry,
    SessionState,
};
use serde::Deserialize;
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Page → native
// ---------------------------------------------------------------------------

#[test]
fn page_calls_exposed_add() {
    let page = Page::new();
    page.session
        .expose("add", |a: i64, b: i64| a + b, false)
        .unwrap();

    page.call(1, "add", vec![json!(2), json!(3)]);

    let wire = page.take_wire_results();
    assert_eq!(wire.len(), 1);
    let raw: Value = serde_json::from_str(&wire[0]).unwrap();
    assert_eq!(raw, json!({"type": "result", "id": 1, "ok": true, "value": 5}));
}

#[test]
fn missing_function_is_reported_to_the_page() {
    let page = Page::new();
    page.call(7, "missing", vec![]);

    let wire = page.take_wire_results();
    let raw: Value = serde_json::from_str(&wire[0]).unwrap();
    assert_eq!(
        raw,
        json!({
            "type": "result",
            "id": 7,
            "ok": false,
            "error": {"kind": "UnknownFunction", "message": "missing"}
        })
    );
}

#[test]
fn bad_arguments_name_their_position() {
    let page = Page::new();
    page.session
        .expose("greet", |name: String, times: u8| name.repeat(times as usize), false)
        .unwrap();

    page.call(1, "greet", vec![json!("hi"), json!(-1)]);
    page.call(2, "greet", vec![json!("hi")]);

    let results = page.take_results();
    for envelope in results {
        match envelope {
            Envelope::Result {
                id: CallId(1),
                payload: Err(err),
            } => {
                assert_eq!(err.kind, ErrorKind::TypeMismatch);
                assert!(err.message.starts_with("argument 1:"), "{}", err.message);
            }
            Envelope::Result {
                id: CallId(2),
                payload: Err(err),
            } => {
                assert_eq!(err.message, "expected 2 argument(s), got 1");
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }
}

#[test]
fn structured_arguments_and_replies() {
    #[derive(Deserialize)]
    struct Order {
        items: Vec<f64>,
        discount: Option<f64>,
    }

    let page = Page::new();
    page.session
        .expose(
            "total",
            |order: Order| {
                let sum: f64 = order.items.iter().sum();
                Ok::<_, String>(json!({"total": sum - order.discount.unwrap_or(0.0)}))
            },
            false,
        )
        .unwrap();

    page.call(3, "total", vec![json!({"items": [1.5, 2.5], "discount": 1})]);

    assert_eq!(
        page.take_results(),
        vec![Envelope::Result {
            id: CallId(3),
            payload: Ok(json!({"total": 3.0})),
        }]
    );
}

#[test]
fn handler_failure_reaches_the_page() {
    let page = Page::new();
    page.session
        .expose(
            "load",
            |path: String| -> Result<String, String> { Err(format!("{path}: not found")) },
            false,
        )
        .unwrap();

    page.call(4, "load", vec![json!("/tmp/x")]);

    assert_eq!(
        page.take_results(),
        vec![Envelope::Result {
            id: CallId(4),
            payload: Err(CallError::handler_failed("/tmp/x: not found")),
        }]
    );
}

#[test]
fn once_function_answers_exactly_one_call() {
    let page = Page::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    page.session
        .expose(
            "confirm",
            move || counter.fetch_add(1, Ordering::SeqCst) + 1,
            true,
        )
        .unwrap();

    page.call(1, "confirm", vec![]);
    page.call(2, "confirm", vec![]);

    let results = page.take_results();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(
        results,
        vec![
            Envelope::Result {
                id: CallId(1),
                payload: Ok(json!(1)),
            },
            Envelope::Result {
                id: CallId(2),
                payload: Err(CallError::unknown_function("confirm")),
            },
        ]
    );
    assert!(page.session.exposed().is_empty());
}

#[test]
fn deferred_handler_answers_from_a_worker() {
    let page = Page::new();
    page.session
        .expose_deferred(
            "fetch",
            |key: String, responder: Responder| {
                std::thread::spawn(move || {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    responder.resolve(format!("value of {key}"));
                });
            },
            false,
        )
        .unwrap();

    page.call(11, "fetch", vec![json!("k")]);

    assert_eq!(
        page.wait_for_results(1),
        vec![Envelope::Result {
            id: CallId(11),
            payload: Ok(json!("value of k")),
        }]
    );
}

#[test]
fn malformed_messages_do_not_end_the_session() {
    let config = BridgeConfig {
        max_message_bytes: 64,
        ..BridgeConfig::default()
    };
    let page = Page::with_config(config);
    page.session.expose("ping", || "pong", false).unwrap();

    page.post("");
    page.post("{");
    page.post(r#"{"type":"call","id":"one","name":"ping"}"#);
    page.post(r#"{"type":"result","id":1,"ok":false}"#);
    page.post(&format!(
        r#"{{"type":"call","id":1,"name":"ping","args":["{}"]}}"#,
        "x".repeat(100)
    ));
    assert!(page.take_results().is_empty());

    page.call(2, "ping", vec![]);
    assert_eq!(
        page.take_results(),
        vec![Envelope::Result {
            id: CallId(2),
            payload: Ok(json!("pong")),
        }]
    );
    assert_eq!(page.session.state(), SessionState::Active);
}

// ---------------------------------------------------------------------------
// Native → page
// ---------------------------------------------------------------------------

#[test]
fn evaluate_posts_the_formatted_expression() {
    let page = Page::new();
    let _pending = page
        .session
        .evaluate::<Value>("render({}, {})", ("title", [1, 2]))
        .unwrap();

    assert_eq!(
        page.take_evaluations(),
        vec![(CallId(1), r#"render("title", [1,2])"#.to_string())]
    );
}

#[test]
fn template_arity_is_checked_before_sending() {
    let page = Page::new();
    let err = page.session.evaluate::<Value>("f({}, {})", (1,)).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::TemplateArity {
            expected: 2,
            actual: 1
        }
    ));
    assert!(page.take_evaluations().is_empty());
    assert_eq!(page.session.pending_calls(), 0);
}

#[test]
fn unanswered_evaluate_stays_pending_until_close() {
    let page = Page::new();
    let mut pending = page.session.evaluate::<i64>("1+1", ()).unwrap();
    assert_eq!(page.take_evaluations().len(), 1);

    assert!(pending.try_result().is_none());
    assert_eq!(page.session.pending_calls(), 1);

    page.session.close();
    assert_eq!(pending.wait(), Err(CallError::session_closed()));
}

#[tokio::test]
async fn results_match_by_id_not_arrival_order() {
    let page = Page::new();
    let mut a = page.session.evaluate::<String>("slow()", ()).unwrap();
    let b = page.session.evaluate::<String>("fast()", ()).unwrap();
    let evaluations = page.take_evaluations();
    assert_eq!(evaluations.len(), 2);

    page.reply(b.id(), Ok(json!("b")));
    assert_eq!(b.await, Ok("b".to_string()));
    assert!(a.try_result().is_none());

    page.reply(a.id(), Ok(json!("a")));
    assert_eq!(a.await, Ok("a".to_string()));
}

#[tokio::test]
async fn page_errors_and_type_mismatches_surface_typed() {
    let page = Page::new();
    let thrown = page.session.evaluate::<Value>("boom()", ()).unwrap();
    let wrong = page.session.evaluate::<u32>("'text'", ()).unwrap();

    page.reply(
        thrown.id(),
        Err(CallError::handler_failed("ReferenceError: boom is not defined")),
    );
    page.reply(wrong.id(), Ok(json!("text")));

    let err = thrown.await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::HandlerFailed);
    assert!(err.message.contains("boom is not defined"));

    assert_eq!(wrong.await.unwrap_err().kind, ErrorKind::TypeMismatch);
}

#[test]
fn late_and_duplicate_results_are_ignored() {
    let page = Page::new();
    let pending = page.session.evaluate::<i64>("40 + 2", ()).unwrap();
    let id = pending.id();

    page.reply(id, Ok(json!(42)));
    page.reply(id, Ok(json!(0)));
    page.reply(CallId(999), Ok(json!(0)));

    assert_eq!(pending.wait(), Ok(42));
    assert_eq!(page.session.pending_calls(), 0);
}

#[test]
fn execute_posts_code_verbatim() {
    let page = Page::new();
    page.session.execute("document.title = 'x';").unwrap();
    page.engine.flush().unwrap();
    assert_eq!(page.engine.take_transcript(), vec!["document.title = 'x';"]);
}

// ---------------------------------------------------------------------------
// Scripts and lifecycle
// ---------------------------------------------------------------------------

#[test]
fn persistent_scripts_are_reinjected_in_order() {
    let page = Page::new();
    assert!(page.session.inject(ScriptEntry::creation("A();")).unwrap());
    assert!(page.session.inject(ScriptEntry::creation("B();")).unwrap());
    assert!(!page.session.inject(ScriptEntry::creation("A();")).unwrap());

    for _ in 0..2 {
        page.engine.navigate().unwrap();
        page.engine.flush().unwrap();
        let transcript = page.engine.take_transcript();
        assert_eq!(transcript.len(), 1, "only the creation blob is injected");

        let blob = &transcript[0];
        let runtime = blob.find("__installed").unwrap();
        let a = blob.find("A();").unwrap();
        let b = blob.find("B();").unwrap();
        assert!(runtime < a && a < b);
    }
}

#[test]
fn ready_scripts_and_one_shots() {
    let page = Page::new();
    page.session.inject(ScriptEntry::ready("onReady();")).unwrap();
    page.session
        .inject(ScriptEntry::ready("firstLoadOnly();").once())
        .unwrap();

    page.engine.navigate().unwrap();
    page.engine.flush().unwrap();
    let first = page.engine.take_transcript();
    assert_eq!(first.len(), 2);
    assert!(first[1].contains("onReady();") && first[1].contains("firstLoadOnly();"));

    page.engine.navigate().unwrap();
    page.engine.flush().unwrap();
    let second = page.engine.take_transcript();
    assert!(second[1].contains("onReady();"));
    assert!(!second[1].contains("firstLoadOnly();"));
}

#[test]
fn uninject_keeps_the_runtime() {
    let page = Page::new();
    page.session.inject(ScriptEntry::creation("user();")).unwrap();
    assert_eq!(page.session.uninject(|_| true), 1);

    page.engine.fire(LoadTime::Creation).unwrap();
    page.engine.flush().unwrap();
    let transcript = page.engine.take_transcript();
    assert!(transcript[0].contains("__installed"));
    assert!(!transcript[0].contains("user();"));
}

#[test]
fn builder_scripts_and_namespace() {
    let engine = Arc::new(pagebridge_engine::HeadlessEngine::new().unwrap());
    let config = BridgeConfig {
        namespace: "native".into(),
        ..BridgeConfig::default()
    };
    let session = pagebridge_rpc::BridgeSession::builder(engine.clone())
        .config(config)
        .script(ScriptEntry::creation("setup();"))
        .build()
        .unwrap();

    engine.fire(LoadTime::Creation).unwrap();
    engine.flush().unwrap();
    let blob = engine.take_transcript().remove(0);
    assert!(blob.contains(r#"const ns = "native";"#));
    assert!(blob.contains("setup();"));
    assert!(blob.contains(pagebridge_engine::headless::HEADLESS_POST_FUNCTION));
    session.close();
}

#[tokio::test]
async fn ready_event_fires_after_bootstrap() {
    let page = Page::new();
    let mut ready = page.session.ready();
    assert!(!*ready.borrow());

    page.post(r#"{"type":"ready"}"#);

    ready.wait_for(|r| *r).await.unwrap();
    assert!(page.session.is_ready());
}

#[test]
fn close_settles_everything() {
    let page = Page::new();
    page.session.expose("f", || 1, false).unwrap();
    let pending: Vec<_> = (0..10)
        .map(|i| page.session.evaluate::<i64>("{}", (i,)).unwrap())
        .collect();
    assert_eq!(page.session.pending_calls(), 10);

    page.session.close();

    assert_eq!(page.session.state(), SessionState::Closed);
    assert_eq!(page.session.pending_calls(), 0);
    assert!(page.session.exposed().is_empty());
    for call in pending {
        assert_eq!(call.wait().unwrap_err().kind, ErrorKind::SessionClosed);
    }

    // Calls from the page after close go nowhere.
    page.engine.take_transcript();
    page.call(1, "f", vec![]);
    assert!(page.take_results().is_empty());
}

#[test]
fn non_finite_replies_are_unsupported() {
    let page = Page::new();
    page.session.expose("ratio", |a: f64, b: f64| a / b, false).unwrap();
    page.call(1, "ratio", vec![json!(1), json!(0)]);
    page.call(2, "ratio", vec![json!(1), json!(4)]);

    let results = page.take_results();
    assert_eq!(results.len(), 2);
    match &results[0] {
        Envelope::Result { id, payload: Err(e) } => {
            assert_eq!(*id, CallId(1));
            assert_eq!(e.kind, ErrorKind::Unsupported);
        }
        other => panic!("expected an error result, got {other:?}"),
    }
    assert_eq!(
        results[1],
        Envelope::Result {
            id: CallId(2),
            payload: Ok(json!(0.25)),
        }
    );
}

#[test]
fn evaluate_racing_close_settles_every_call() {
    let page = Page::new();
    let barrier = &Barrier::new(9);
    let session = &page.session;

    let calls: Vec<Pending<i64>> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(move || {
                    barrier.wait();
                    (0..20)
                        .filter_map(|i| session.evaluate::<i64>("{}", (i,)).ok())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        barrier.wait();
        session.close();
        workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect()
    });

    let ids: HashSet<CallId> = calls.iter().map(|call| call.id()).collect();
    assert_eq!(ids.len(), calls.len());
    for call in calls {
        assert_eq!(call.wait().unwrap_err().kind, ErrorKind::SessionClosed);
    }
    assert_eq!(page.session.pending_calls(), 0);
}

#[test]
fn duplicate_policy_follows_config() {
    let config = BridgeConfig {
        duplicate_expose: pagebridge_rpc::DuplicatePolicy::Reject,
        ..BridgeConfig::default()
    };
    let page = Page::with_config(config);
    page.session.expose("v", || 1, false).unwrap();
    assert!(matches!(
        page.session.expose("v", || 2, false),
        Err(BridgeError::DuplicateFunction(_))
    ));

    let page = Page::new();
    page.session.expose("v", || 1, false).unwrap();
    page.session.expose("v", || 2, false).unwrap();
    page.call(1, "v", vec![]);
    assert_eq!(
        page.take_results(),
        vec![Envelope::Result {
            id: CallId(1),
            payload: Ok(json!(2)),
        }]
    );
}
