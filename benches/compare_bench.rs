// benches/compare_bench.rs
//! Comparison and capture hot-path benchmarks
//!
//! Run with: cargo bench --bench compare_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use traffic_replay_engine::compare::CompareEngine;
use traffic_replay_engine::model::{HttpRequest, HttpResponse, RequestPayload, ResponsePayload};
use traffic_replay_engine::recording::CaptureQueue;
use traffic_replay_engine::TestRecord;

fn order(items: usize, price_bump: u64) -> Value {
    let lines: Vec<Value> = (0..items as u64)
        .map(|i| json!({"sku": format!("SKU-{}", i), "qty": i % 5 + 1, "price": 100 + i + price_bump}))
        .collect();
    json!({"id": "ord-1", "status": "OPEN", "lines": lines})
}

/// Structural diff over arrays of growing size
fn bench_compare_values(c: &mut Criterion) {
    let engine = CompareEngine::default();
    let mut group = c.benchmark_group("compare_values");

    for items in [10, 100, 1_000] {
        let baseline = order(items, 0);
        let candidate = order(items, 1);

        group.bench_with_input(BenchmarkId::from_parameter(items), &items, |b, _| {
            b.iter(|| engine.compare_values(black_box(&baseline), black_box(&candidate)))
        });
    }

    group.finish();
}

/// Full HTTP layering with JSON bodies
fn bench_compare_http(c: &mut Criterion) {
    let engine = CompareEngine::default();
    let baseline = ResponsePayload::Http(
        HttpResponse::new(200)
            .with_header("content-type", "application/json")
            .with_body(order(100, 0).to_string()),
    );
    let candidate = ResponsePayload::Http(
        HttpResponse::new(200)
            .with_header("content-type", "application/json")
            .with_body(order(100, 1).to_string()),
    );

    c.bench_function("compare_http_100_lines", |b| {
        b.iter(|| engine.compare(black_box(&baseline), black_box(&candidate)).unwrap())
    });
}

/// Enqueue and drain through the in-memory ring
fn bench_capture_queue(c: &mut Criterion) {
    let queue = CaptureQueue::new(10_000);
    let request = RequestPayload::Http(HttpRequest::new("GET", "/orders/1"));

    c.bench_function("capture_enqueue_drain_1000", |b| {
        b.iter(|| {
            for _ in 0..1_000 {
                queue.enqueue(TestRecord::capture(request.clone()));
            }
            black_box(queue.drain())
        })
    });
}

criterion_group!(
    benches,
    bench_compare_values,
    bench_compare_http,
    bench_capture_queue
);
criterion_main!(benches);
