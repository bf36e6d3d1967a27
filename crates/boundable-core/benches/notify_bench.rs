//! Benchmarks for notification fan-out and computable recomputation.
//!
//! Run with: cargo bench -p boundable-core --bench notify_bench

use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use boundable_core::{BoundValue, Computable, Subscription};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

// =============================================================================
// Fan-out
// =============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify/fan_out");

    for subscribers in [1usize, 16, 256] {
        let cell = BoundValue::new(0u64);
        let hits = Rc::new(Cell::new(0u64));
        let _subs: Vec<Subscription> = (0..subscribers)
            .map(|_| {
                let hits = Rc::clone(&hits);
                cell.subscribe(move |v| hits.set(hits.get().wrapping_add(*v)))
            })
            .collect();

        let mut next = 0u64;
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    next += 1;
                    cell.write(black_box(next));
                })
            },
        );
    }

    group.finish();
}

// =============================================================================
// Computable chains
// =============================================================================

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("computable/chain");

    for depth in [1usize, 8, 32] {
        let source = BoundValue::new(0u64);
        let mut tail = Computable::new({
            let source = source.clone();
            move || source.read() + 1
        });
        for _ in 1..depth {
            let prev = tail.clone();
            tail = Computable::new(move || prev.read() + 1);
        }
        let _sub = tail.subscribe(|v| {
            black_box(*v);
        });

        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("warm_write", depth), &depth, |b, _| {
            b.iter(|| {
                next += 1;
                source.write(black_box(next));
            })
        });
    }

    let source = BoundValue::new(3u64);
    let cold = Computable::new({
        let source = source.clone();
        move || source.read() * 7
    });
    group.bench_function("cold_read", |b| b.iter(|| black_box(cold.read())));

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_chain);
criterion_main!(benches);
