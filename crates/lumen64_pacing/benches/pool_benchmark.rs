//! Benchmarks for queue hand-off and pool fan-out.
//!
//! Run with: cargo bench --package lumen64_pacing --bench pool_benchmark

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lumen64_core::{DisplayListRequest, RenderCommand, StateSlot, StateValue};
use lumen64_pacing::{bounded_queue, WorkerPool};

fn benchmark_queue(c: &mut Criterion) {
    let (tx, rx) = bounded_queue::<u64>(3, Duration::from_millis(50));
    c.bench_function("queue_push_pop", |b| {
        b.iter(|| {
            let _ = tx.push(black_box(7));
            black_box(rx.try_pop())
        });
    });
}

fn benchmark_map_ordered(c: &mut Criterion) {
    let pool = match WorkerPool::new(0) {
        Ok(pool) => pool,
        Err(_) => return,
    };
    let list: Vec<RenderCommand> = (0..512)
        .map(|i| RenderCommand::set(StateSlot::Texture0, StateValue::Handle(i)))
        .collect();
    let requests: Vec<DisplayListRequest> = (0..16).map(|_| DisplayListRequest::new(list.clone())).collect();

    c.bench_function("map_ordered_fingerprint_16_lists", |b| {
        b.iter(|| {
            black_box(pool.map_ordered(requests.clone(), |mut request| request.ensure_tagged()))
        });
    });

    let inline = WorkerPool::inline();
    c.bench_function("inline_fingerprint_16_lists", |b| {
        b.iter(|| {
            black_box(inline.map_ordered(requests.clone(), |mut request| request.ensure_tagged()))
        });
    });
}

criterion_group!(benches, benchmark_queue, benchmark_map_ordered);
criterion_main!(benches);
