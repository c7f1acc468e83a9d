//! Simulated Document Store with Fault Injection
//!
//! DST-compatible wrapper that injects faults using buggify.
//! Follows FoundationDB patterns for deterministic simulation testing.

use crate::buggify::faults::document_store as faults;
use crate::io::Rng;
use crate::store::{
    CursorOptions, Document, DocumentCursor, DocumentStore, FindOptions, Query, StoreError,
    StoreFuture,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for simulated fault injection
#[derive(Debug, Clone)]
pub struct SimulatedStoreConfig {
    /// Probability of FIND failure
    pub find_fail_prob: f64,
    /// Probability of COUNT failure
    pub count_fail_prob: f64,
    /// Probability of a non-retryable upsert failure
    pub upsert_fail_prob: f64,
    /// Probability of an upsert reporting a duplicate key without writing
    pub spurious_duplicate_key_prob: f64,
    /// Probability of DELETE failure
    pub delete_fail_prob: f64,
    /// Probability of a cursor `next` failure
    pub cursor_fail_prob: f64,
    /// Probability of delaying an operation
    pub latency_prob: f64,
    /// Simulated latency range in microseconds (min, max)
    pub latency_range_us: (u64, u64),
}

impl Default for SimulatedStoreConfig {
    fn default() -> Self {
        SimulatedStoreConfig {
            find_fail_prob: 0.01,               // 1%
            count_fail_prob: 0.01,              // 1%
            upsert_fail_prob: 0.005,            // 0.5%
            spurious_duplicate_key_prob: 0.05,  // 5%
            delete_fail_prob: 0.01,             // 1%
            cursor_fail_prob: 0.005,            // 0.5%
            latency_prob: 0.0,
            latency_range_us: (100, 10_000),    // 0.1ms - 10ms
        }
    }
}

impl SimulatedStoreConfig {
    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        SimulatedStoreConfig {
            find_fail_prob: 0.0,
            count_fail_prob: 0.0,
            upsert_fail_prob: 0.0,
            spurious_duplicate_key_prob: 0.0,
            delete_fail_prob: 0.0,
            cursor_fail_prob: 0.0,
            latency_prob: 0.0,
            latency_range_us: (0, 0),
        }
    }

    /// Only retryable upsert conflicts; every operation eventually succeeds
    pub fn conflicts_only(prob: f64) -> Self {
        SimulatedStoreConfig {
            spurious_duplicate_key_prob: prob,
            ..Self::no_faults()
        }
    }
}

/// Statistics for fault injection
#[derive(Debug, Clone, Default)]
pub struct SimulatedStoreStats {
    pub find_attempts: u64,
    pub find_failures: u64,
    pub count_attempts: u64,
    pub count_failures: u64,
    pub upsert_attempts: u64,
    pub upsert_failures: u64,
    pub duplicate_keys_injected: u64,
    pub delete_attempts: u64,
    pub delete_failures: u64,
    pub cursors_opened: u64,
    pub cursor_failures: u64,
    pub delays: u64,
}

struct SimulatedStoreInner<R: Rng> {
    rng: R,
    stats: SimulatedStoreStats,
}

type SharedState<R> = Arc<Mutex<SimulatedStoreInner<R>>>;

fn roll<R: Rng>(state: &SharedState<R>, fault_id: &'static str, prob: f64) -> bool {
    let mut s = state.lock();
    crate::buggify!(&mut s.rng, fault_id, prob)
}

async fn maybe_delay<R: Rng>(state: &SharedState<R>, config: &SimulatedStoreConfig) {
    let delay_us = {
        let mut s = state.lock();
        if !crate::buggify!(&mut s.rng, faults::LATENCY, config.latency_prob) {
            return;
        }
        s.stats.delays += 1;
        let (min, max) = config.latency_range_us;
        s.rng.gen_range(min, max.max(min))
    };
    if delay_us > 0 {
        tokio::time::sleep(Duration::from_micros(delay_us)).await;
    }
}

/// Simulated document store that wraps another store and injects faults
pub struct SimulatedDocumentStore<S: DocumentStore + Clone, R: Rng> {
    inner_store: S,
    config: SimulatedStoreConfig,
    state: SharedState<R>,
}

impl<S: DocumentStore + Clone, R: Rng> SimulatedDocumentStore<S, R> {
    /// Create a new simulated store with the given RNG
    pub fn new(inner_store: S, rng: R, config: SimulatedStoreConfig) -> Self {
        SimulatedDocumentStore {
            inner_store,
            config,
            state: Arc::new(Mutex::new(SimulatedStoreInner {
                rng,
                stats: SimulatedStoreStats::default(),
            })),
        }
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner_store
    }

    /// Get current statistics
    pub fn stats(&self) -> SimulatedStoreStats {
        self.state.lock().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.state.lock().stats = SimulatedStoreStats::default();
    }

    fn record(&self, update: impl FnOnce(&mut SimulatedStoreStats)) {
        update(&mut self.state.lock().stats);
    }
}

impl<S: DocumentStore + Clone, R: Rng> DocumentStore for SimulatedDocumentStore<S, R> {
    fn find<'a>(
        &'a self,
        query: &'a Query,
        options: &'a FindOptions,
    ) -> StoreFuture<'a, Vec<Document>> {
        Box::pin(async move {
            self.record(|s| s.find_attempts += 1);
            if roll(&self.state, faults::FIND_FAIL, self.config.find_fail_prob) {
                self.record(|s| s.find_failures += 1);
                return Err(StoreError::Unavailable("simulated find failure".into()));
            }
            maybe_delay(&self.state, &self.config).await;
            self.inner_store.find(query, options).await
        })
    }

    fn count<'a>(&'a self, query: &'a Query) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            self.record(|s| s.count_attempts += 1);
            if roll(&self.state, faults::COUNT_FAIL, self.config.count_fail_prob) {
                self.record(|s| s.count_failures += 1);
                return Err(StoreError::Unavailable("simulated count failure".into()));
            }
            maybe_delay(&self.state, &self.config).await;
            self.inner_store.count(query).await
        })
    }

    fn find_one_and_increment<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        delta: f64,
    ) -> StoreFuture<'a, Document> {
        Box::pin(async move {
            self.record(|s| s.upsert_attempts += 1);
            if roll(&self.state, faults::UPSERT_FAIL, self.config.upsert_fail_prob) {
                self.record(|s| s.upsert_failures += 1);
                return Err(StoreError::Other("simulated upsert failure".into()));
            }
            if roll(
                &self.state,
                faults::SPURIOUS_DUPLICATE_KEY,
                self.config.spurious_duplicate_key_prob,
            ) {
                self.record(|s| s.duplicate_keys_injected += 1);
                return Err(StoreError::DuplicateKey(format!("{}/{}", key, value)));
            }
            maybe_delay(&self.state, &self.config).await;
            self.inner_store.find_one_and_increment(key, value, delta).await
        })
    }

    fn delete_many<'a>(&'a self, query: &'a Query) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            self.record(|s| s.delete_attempts += 1);
            if roll(&self.state, faults::DELETE_FAIL, self.config.delete_fail_prob) {
                self.record(|s| s.delete_failures += 1);
                return Err(StoreError::Unavailable("simulated delete failure".into()));
            }
            maybe_delay(&self.state, &self.config).await;
            self.inner_store.delete_many(query).await
        })
    }

    fn open_cursor<'a>(
        &'a self,
        query: &'a Query,
        options: &'a CursorOptions,
    ) -> StoreFuture<'a, Box<dyn DocumentCursor>> {
        Box::pin(async move {
            self.record(|s| s.cursors_opened += 1);
            let inner = self.inner_store.open_cursor(query, options).await?;
            Ok(Box::new(SimulatedCursor {
                inner,
                state: Arc::clone(&self.state),
                fail_prob: self.config.cursor_fail_prob,
            }) as Box<dyn DocumentCursor>)
        })
    }
}

impl<S: DocumentStore + Clone, R: Rng> Clone for SimulatedDocumentStore<S, R> {
    fn clone(&self) -> Self {
        SimulatedDocumentStore {
            inner_store: self.inner_store.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
        }
    }
}

struct SimulatedCursor<R: Rng> {
    inner: Box<dyn DocumentCursor>,
    state: SharedState<R>,
    fail_prob: f64,
}

impl<R: Rng> DocumentCursor for SimulatedCursor<R> {
    fn next(&mut self) -> StoreFuture<'_, Option<Document>> {
        Box::pin(async move {
            if roll(&self.state, faults::CURSOR_FAIL, self.fail_prob) {
                self.state.lock().stats.cursor_failures += 1;
                return Err(StoreError::Unavailable("simulated cursor failure".into()));
            }
            self.inner.next().await
        })
    }

    fn close(&mut self) -> StoreFuture<'_, ()> {
        self.inner.close()
    }
}
