//! Recording hot path benchmarks
//!
//! - Counter increment (uncontended and across threads)
//! - Timer record
//! - Registry lookup of an existing meter vs. creation of new ones
//! - Snapshotting a populated registry

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tally_common::{MeterId, MeterKind, Tags, TimeUnit};
use tally_core::MeterRegistry;

// ============ METER BENCHMARKS ============

fn bench_counter(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter");
    let registry = MeterRegistry::new();
    let counter = registry
        .counter("requests", Tags::of([("method", "GET")]))
        .unwrap();

    group.throughput(Throughput::Elements(1));
    group.bench_function("increment", |b| {
        b.iter(|| counter.increment_by(black_box(1.0)));
    });

    for threads in [2usize, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("contended_increment", threads),
            threads,
            |b, &threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let counter = counter.clone();
                            thread::spawn(move || {
                                for _ in 0..1_000 {
                                    counter.increment();
                                }
                            })
                        })
                        .collect();
                    for h in handles {
                        h.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_timer(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer");
    let registry = MeterRegistry::new();
    let timer = registry.timer("db.query", Tags::empty()).unwrap();

    group.bench_function("record", |b| {
        b.iter(|| timer.record(black_box(Duration::from_micros(750))));
    });

    group.finish();
}

// ============ REGISTRY BENCHMARKS ============

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    let registry = Arc::new(MeterRegistry::new());
    registry
        .counter("cache.gets", Tags::of([("cache", "users"), ("result", "hit")]))
        .unwrap();

    // Existing meter: the path every instrumented call site takes
    group.bench_function("lookup_existing", |b| {
        b.iter(|| {
            registry
                .counter(
                    black_box("cache.gets"),
                    Tags::of([("result", "hit"), ("cache", "users")]),
                )
                .unwrap()
        });
    });

    group.bench_function("create_new", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            registry
                .get_or_create(
                    MeterId::new("dynamic", Tags::of([("n", n.to_string())]), MeterKind::Gauge),
                    |id| tally_core::Meter::Gauge(tally_core::Gauge::new(id, || 1.0)),
                )
                .unwrap()
        });
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for meters in [100usize, 1_000, 10_000].iter() {
        let registry = MeterRegistry::new();
        for i in 0..*meters {
            let timer = registry
                .timer("rpc", Tags::of([("method", format!("m{}", i))]))
                .unwrap();
            timer.record(Duration::from_millis(3));
        }

        group.throughput(Throughput::Elements(*meters as u64));
        group.bench_with_input(BenchmarkId::new("meters", meters), meters, |b, _| {
            b.iter(|| {
                let snapshots: Vec<_> = registry
                    .meters()
                    .iter()
                    .map(|m| m.snapshot(TimeUnit::Milliseconds))
                    .collect();
                black_box(snapshots)
            });
        });
    }

    group.finish();
}

criterion_group!(meters, bench_counter, bench_timer);
criterion_group!(registry, bench_registry, bench_snapshot);

criterion_main!(meters, registry);
