// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for envelope encoding, decoding and expression
// formatting in the pagebridge-rpc crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};

use pagebridge_core::types::CallId;
use pagebridge_rpc::runtime::format_expression;
use pagebridge_rpc::{JsonSerializer, Serializer};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A record shaped like a typical page payload: strings, numbers, a list.
fn record(i: usize) -> Value {
    json!({
        "id": i,
        "title": format!("row {i} with \"quotes\" and unicode ✓"),
        "price": i as f64 * 1.25,
        "tags": ["alpha", "beta", "gamma"],
        "active": i % 2 == 0,
    })
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Encode a call envelope with a handful of small arguments.
fn bench_encode_call(c: &mut Criterion) {
    let serializer = JsonSerializer;
    let args = vec![json!(2), json!(3), json!("three"), json!([1.5, 2.5])];

    c.bench_function("encode_call (4 small args)", |b| {
        b.iter(|| {
            let encoded = serializer
                .encode_call(CallId(1), black_box("add"), black_box(&args))
                .expect("encode failed");
            black_box(encoded);
        });
    });
}

/// Decode result envelopes at several payload sizes.
///
/// Sizes: 1, 100 and 10 000 records, from a scalar reply to a table dump.
fn bench_decode_result(c: &mut Criterion) {
    let serializer = JsonSerializer;
    let sizes: &[(&str, usize)] = &[("1 record", 1), ("100 records", 100), ("10k records", 10_000)];

    let mut group = c.benchmark_group("decode_result");
    for &(label, count) in sizes {
        let value = Value::Array((0..count).map(record).collect());
        let wire = serializer
            .encode_result(CallId(9), &Ok(value))
            .expect("encode failed");
        group.bench_function(label, |b| {
            b.iter(|| {
                let envelope = serializer.decode(black_box(&wire)).expect("decode failed");
                black_box(envelope);
            });
        });
    }
    group.finish();
}

/// Reject malformed input; hostile pages should be cheap to ignore.
fn bench_decode_malformed(c: &mut Criterion) {
    let serializer = JsonSerializer;
    let garbage = "{\"type\":\"call\",\"id\":".repeat(64);

    c.bench_function("decode_malformed", |b| {
        b.iter(|| {
            let result = serializer.decode(black_box(&garbage));
            assert!(result.is_err());
            black_box(result.is_err());
        });
    });
}

/// Substitute arguments into an evaluate template.
fn bench_format_expression(c: &mut Criterion) {
    let serializer = JsonSerializer;
    let args = vec![record(1), json!("selector"), json!(42)];

    c.bench_function("format_expression (3 args)", |b| {
        b.iter(|| {
            let script = format_expression(
                &serializer,
                black_box("render({}, document.querySelector({}), {})"),
                black_box(&args),
            )
            .expect("format failed");
            black_box(script);
        });
    });
}

criterion_group!(
    benches,
    bench_encode_call,
    bench_decode_result,
    bench_decode_malformed,
    bench_format_expression,
);
criterion_main!(benches);
