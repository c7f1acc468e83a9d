//! Sorted-set engine simulator
//!
//! Runs a batch of deterministic simulation seeds against the engine, then a
//! concurrent first-insert increment race and a paced bulk scan over the
//! in-memory store.
//!
//! Usage: `zset-sim [seeds] [ops-per-seed] [start-seed]`
//!
//! Configuration comes from the file named by `ZSET_CONFIG` (TOML), then
//! `ZSET_*` overrides. Log level via `RUST_LOG`.

use docstore_zset::io::production::ProductionRng;
use docstore_zset::io::Rng;
use docstore_zset::zset::{run_engine_dst_batch, summarize_batch, EngineDSTConfig};
use docstore_zset::{EngineConfig, InMemoryDocumentStore, SetItem, SortedSetEngine};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

fn arg_or<T: std::str::FromStr>(args: &[String], idx: usize, default: T) -> T {
    args.get(idx).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn load_config() -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match std::env::var("ZSET_CONFIG") {
        Ok(path) => EngineConfig::from_file(path)?,
        Err(_) => EngineConfig::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docstore_zset=info,zset_sim=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let seeds: usize = arg_or(&args, 1, 20);
    let ops: usize = arg_or(&args, 2, 300);
    let start_seed: u64 = arg_or(&args, 3, ProductionRng::new().next_u64() % 1_000_000);
    let config = load_config()?;

    println!("Sorted-Set Engine Simulator");
    println!("===========================");
    println!("  Seeds:        {} starting at {}", seeds, start_seed);
    println!("  Ops per seed: {}", ops);
    println!("  Batch size:   {}", config.process.batch_size);
    println!();

    // Phase 1: deterministic simulation
    let results = run_engine_dst_batch(start_seed, seeds, ops, EngineDSTConfig::new).await;
    println!("{}", summarize_batch(&results));
    println!("{}", docstore_zset::buggify::get_stats().summary());
    let failed = results.iter().filter(|r| !r.is_success()).count();

    // Phase 2: concurrent first inserts on a multi-threaded runtime
    let store = InMemoryDocumentStore::new();
    let engine = Arc::new(SortedSetEngine::with_config(store.clone(), config.clone()));
    let writers = 64;
    let handles: Vec<_> = (0..writers)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.increment_by("race", "member", 1.0).await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }
    let score = engine.score("race", "member").await?;
    info!(
        "increment race: {} writers, final score {:?}, {} duplicate-key retries",
        writers,
        score,
        store.duplicate_key_errors()
    );
    println!(
        "Increment race: {} writers -> score {:?} ({} duplicate-key retries)",
        writers,
        score,
        store.duplicate_key_errors()
    );

    // Phase 3: paced bulk scan with configured defaults
    for i in 0..250u32 {
        engine.increment_by("scan", &i, f64::from(i)).await?;
    }
    let delivered = Arc::new(AtomicU64::new(0));
    let sink_delivered = delivered.clone();
    let stats = engine
        .process_all_default("scan", move |batch: Vec<SetItem>| {
            let delivered = sink_delivered.clone();
            async move {
                delivered.fetch_add(batch.len() as u64, Ordering::Relaxed);
                Ok::<(), std::io::Error>(())
            }
        })
        .await?;
    println!(
        "Bulk scan: {} items in {} batches ({} delivered)",
        stats.items,
        stats.batches,
        delivered.load(Ordering::Relaxed)
    );

    if failed > 0 {
        return Err(format!("{} of {} seeds failed", failed, seeds).into());
    }
    Ok(())
}
