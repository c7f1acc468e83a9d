//! Range query benchmarks over the in-memory store.
//!
//! Run with: `cargo bench --bench range_queries`
//!
//! Measures the engine overhead on top of the store: window resolution,
//! flipped reads for negative windows, rank counting, and bulk processing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docstore_zset::zset::{RankWindow, WindowPlan};
use docstore_zset::{InMemoryDocumentStore, ProcessOptions, SetItem, SortedSetEngine};
use tokio::runtime::Runtime;

fn engine_with(size: u64) -> SortedSetEngine<InMemoryDocumentStore> {
    let store = InMemoryDocumentStore::new();
    for i in 0..size {
        store.insert("bench", &format!("member:{:06}", i), (i % 97) as f64);
    }
    SortedSetEngine::new(store)
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

/// Pure window resolution
fn bench_window_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_resolve");
    group.throughput(Throughput::Elements(1));

    for (name, start, stop) in [("full", 0, -1), ("suffix", 0, -10), ("tail", -10, -1), ("mixed", -10, 5)] {
        group.bench_function(name, |b| {
            b.iter(|| match RankWindow::new(black_box(start), black_box(stop)).resolve() {
                WindowPlan::NeedsCardinality => RankWindow::new(start, stop).absolute(black_box(1000)),
                plan => plan,
            })
        });
    }

    group.finish();
}

/// range / rev_range windows at different set sizes
fn bench_range(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("range");

    for size in [100u64, 1_000, 10_000] {
        let engine = engine_with(size);
        group.throughput(Throughput::Elements(10));

        group.bench_with_input(BenchmarkId::new("head_10", size), &engine, |b, engine| {
            b.iter(|| rt.block_on(engine.range("bench", 0, 9)))
        });
        group.bench_with_input(BenchmarkId::new("tail_10", size), &engine, |b, engine| {
            b.iter(|| rt.block_on(engine.range("bench", -10, -1)))
        });
        group.bench_with_input(BenchmarkId::new("rev_head_10", size), &engine, |b, engine| {
            b.iter(|| rt.block_on(engine.rev_range_with_scores("bench", 0, 9)))
        });
    }

    group.finish();
}

/// Counted rank vs one full-fetch rank batch
fn bench_rank(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("rank");
    let engine = engine_with(1_000);
    let members: Vec<String> = (0..50).map(|i| format!("member:{:06}", i * 17)).collect();

    group.throughput(Throughput::Elements(members.len() as u64));
    group.bench_function("counted_x50", |b| {
        b.iter(|| {
            rt.block_on(async {
                for m in &members {
                    black_box(engine.rank("bench", m.as_str()).await.ok());
                }
            })
        })
    });
    group.bench_function("ranks_fetch_x50", |b| {
        b.iter(|| rt.block_on(engine.ranks("bench", &members)))
    });

    group.finish();
}

/// process_all throughput by batch size
fn bench_process_all(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("process_all");
    let engine = engine_with(10_000);
    group.throughput(Throughput::Elements(10_000));

    for batch_size in [10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch_size, |b, &batch_size| {
            b.iter(|| {
                rt.block_on(engine.process_all(
                    "bench",
                    |batch: Vec<SetItem>| async move {
                        black_box(batch);
                        Ok::<(), std::io::Error>(())
                    },
                    ProcessOptions::default().batch_size(batch_size),
                ))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_window_resolve, bench_range, bench_rank, bench_process_all);
criterion_main!(benches);
