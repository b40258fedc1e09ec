// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for action dispatch, the legacy string conversion and
// the notification delegate chain in pushbridge-interop.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Map, json};

use pushbridge_interop::notification::{Completion, Notification, NotificationDelegate};
use pushbridge_interop::stub::StubSdk;
use pushbridge_interop::{NotificationDelegateChain, Parameters, StructuredPromise, bridge, legacy};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Dispatch a synchronous getter through the structured and legacy paths.
fn bench_dispatch(c: &mut Criterion) {
    let sdk = StubSdk::with_identity("bench-install", Some("bench-token"));
    let dispatcher = bridge(Arc::new(sdk), Arc::new(NotificationDelegateChain::new()))
        .expect("catalogue registers");
    let empty = Parameters::default();

    c.bench_function("dispatch push.getLastKnownPushToken", |b| {
        b.iter(|| {
            let promise = dispatcher.dispatch(black_box("push.getLastKnownPushToken"), &empty, None);
            black_box(promise.peek());
        });
    });

    c.bench_function("legacy call user.edit (3 operations)", |b| {
        let parameters = json!({ "operations": [
            { "operation": "SET_LANGUAGE", "value": "en" },
            { "operation": "ADD_TAG", "collection": "bench", "tag": "t" },
            { "operation": "SET_ATTRIBUTE", "key": "n", "type": "integer", "value": 3 }
        ]});
        b.iter(|| {
            let promise = dispatcher.call("user.edit", black_box(parameters.clone()), None);
            black_box(promise.peek());
        });
    });
}

/// Convert resolved structured promises of increasing size to legacy strings.
fn bench_legacy_conversion(c: &mut Criterion) {
    let sizes: &[(&str, usize)] = &[("10 keys", 10), ("100 keys", 100), ("1000 keys", 1000)];

    let mut group = c.benchmark_group("legacy_convert");
    for &(label, size) in sizes {
        let value: Map<_, _> = (0..size).map(|i| (format!("k{i}"), json!(i))).collect();
        let source = StructuredPromise::resolved(value.into());
        group.bench_function(label, |b| {
            b.iter(|| black_box(legacy::convert(black_box(&source)).peek()));
        });
    }
    group.finish();
}

/// Deliver a foreground notification to a ready chain with no previous
/// delegate.
fn bench_chain_present(c: &mut Criterion) {
    let chain = NotificationDelegateChain::new();
    chain.mark_ready();
    let notification = Notification::new("bench", Map::new());

    c.bench_function("chain will_present (ready)", |b| {
        b.iter(|| {
            chain.will_present(black_box(&notification), Completion::new(|options| {
                black_box(options);
            }));
        });
    });
}

criterion_group!(benches, bench_dispatch, bench_legacy_conversion, bench_chain_present);
criterion_main!(benches);
