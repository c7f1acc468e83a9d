//! Deterministic Simulation Testing for the Sorted-Set Engine
//!
//! VOPR-style harness that drives random increments, lex removals and reads
//! through a [`SortedSetEngine`] backed by a fault-injecting
//! [`SimulatedDocumentStore`], and checks every result against a plain
//! `BTreeMap` model.
//!
//! - Deterministic random operation generation
//! - Store faults: failed ops must leave the model untouched, duplicate-key
//!   races must never surface
//! - Invariant checking after each operation, read through a fault-free view
//!   of the same collection
//! - Seed-based reproducibility for debugging
//!
//! ## Usage
//!
//! ```rust,ignore
//! for seed in 0..100 {
//!     let mut harness = SortedSetEngineDSTHarness::with_seed(seed);
//!     harness.run(500).await;
//!     assert!(harness.result().is_success(), "Seed {} failed", seed);
//! }
//! ```

use super::lex::LexPage;
use super::{ScoredMember, SortedSetEngine, ZsetError};
use crate::config::EngineConfig;
use crate::io::simulation::SimulatedRng;
use crate::io::Rng;
use crate::store::{InMemoryDocumentStore, SimulatedDocumentStore, SimulatedStoreConfig};
use std::collections::BTreeMap;
use std::ops::{Bound, RangeBounds};

type SimStore = SimulatedDocumentStore<InMemoryDocumentStore, SimulatedRng>;

/// Configuration for engine DST
#[derive(Debug, Clone)]
pub struct EngineDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of distinct sets
    pub num_keys: usize,
    /// Number of distinct members per set
    pub num_members: usize,
    /// Probability of an increment (vs a read)
    pub increment_prob: f64,
    /// Probability of a lex removal
    pub remove_prob: f64,
    /// Increments are multiples of 0.25 in `[-max_delta, max_delta]`
    pub max_delta: f64,
    /// Store fault injection
    pub store: SimulatedStoreConfig,
}

impl Default for EngineDSTConfig {
    fn default() -> Self {
        EngineDSTConfig {
            seed: 0,
            num_keys: 3,
            num_members: 20,
            increment_prob: 0.5,
            remove_prob: 0.05,
            max_delta: 10.0,
            store: SimulatedStoreConfig {
                find_fail_prob: 0.02,
                count_fail_prob: 0.02,
                upsert_fail_prob: 0.01,
                spurious_duplicate_key_prob: 0.1,
                delete_fail_prob: 0.02,
                cursor_fail_prob: 0.0,
                latency_prob: 0.0,
                latency_range_us: (0, 0),
            },
        }
    }
}

impl EngineDSTConfig {
    /// Standard configuration with given seed
    pub fn new(seed: u64) -> Self {
        EngineDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// No store faults
    pub fn no_faults(seed: u64) -> Self {
        EngineDSTConfig {
            seed,
            store: SimulatedStoreConfig::no_faults(),
            ..Default::default()
        }
    }

    /// Few members, frequent duplicate-key races, many score ties
    pub fn high_contention(seed: u64) -> Self {
        EngineDSTConfig {
            seed,
            num_keys: 1,
            num_members: 6,
            increment_prob: 0.7,
            max_delta: 1.0,
            store: SimulatedStoreConfig {
                spurious_duplicate_key_prob: 0.5,
                ..Self::default().store
            },
            ..Default::default()
        }
    }
}

/// Operation type for logging
#[derive(Debug, Clone)]
pub enum EngineOp {
    Increment { key: String, member: String, delta: f64 },
    RemoveLex { key: String, min: String, max: String },
    Range { key: String, start: i64, stop: i64, reverse: bool },
    RangeByScore { key: String, start: u64, count: i64, min: f64, max: f64 },
    RangeByLex { key: String, min: String, max: String },
    Rank { key: String, member: String, reverse: bool },
}

/// Result of an engine DST run
#[derive(Debug, Clone)]
pub struct EngineDSTResult {
    /// Seed used
    pub seed: u64,
    /// Total operations executed
    pub total_operations: u64,
    pub increments: u64,
    pub removes: u64,
    pub reads: u64,
    /// Operations that failed with an injected store error
    pub failed_operations: u64,
    /// Duplicate-key conflicts injected (all retried internally)
    pub duplicate_keys_injected: u64,
    /// Invariant violations found (with operation context)
    pub invariant_violations: Vec<String>,
    /// Last operation before failure (if any)
    pub last_op: Option<EngineOp>,
}

impl EngineDSTResult {
    pub fn new(seed: u64) -> Self {
        EngineDSTResult {
            seed,
            total_operations: 0,
            increments: 0,
            removes: 0,
            reads: 0,
            failed_operations: 0,
            duplicate_keys_injected: 0,
            invariant_violations: Vec::new(),
            last_op: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops ({} increments, {} removes, {} reads, {} failed, {} dup-key retries), {} violations",
            self.seed,
            self.total_operations,
            self.increments,
            self.removes,
            self.reads,
            self.failed_operations,
            self.duplicate_keys_injected,
            self.invariant_violations.len()
        )
    }
}

/// Native sorted-set slice of an ordered sequence
fn native_slice<T: Clone>(items: &[T], start: i64, stop: i64) -> Vec<T> {
    let len = items.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return Vec::new();
    }
    items[start as usize..=stop as usize].to_vec()
}

fn render_min(bound: &Bound<String>, bare: bool) -> String {
    match bound {
        Bound::Unbounded => "-".to_string(),
        Bound::Included(m) if bare => m.clone(),
        Bound::Included(m) => format!("[{}", m),
        Bound::Excluded(m) => format!("({}", m),
    }
}

fn render_max(bound: &Bound<String>, bare: bool) -> String {
    match bound {
        Bound::Unbounded => "+".to_string(),
        other => render_min(other, bare),
    }
}

/// DST harness for the sorted-set engine
pub struct SortedSetEngineDSTHarness {
    config: EngineDSTConfig,
    rng: SimulatedRng,
    engine: SortedSetEngine<SimStore>,
    /// Fault-free view of the same collection, for invariant checks
    checker: SortedSetEngine<InMemoryDocumentStore>,
    model: BTreeMap<String, BTreeMap<String, f64>>,
    result: EngineDSTResult,
}

impl SortedSetEngineDSTHarness {
    pub fn new(config: EngineDSTConfig) -> Self {
        let mut rng = SimulatedRng::new(config.seed);
        let store_rng = SimulatedRng::new(rng.next_u64());
        let inner = InMemoryDocumentStore::new();
        let store = SimulatedDocumentStore::new(inner.clone(), store_rng, config.store.clone());

        SortedSetEngineDSTHarness {
            result: EngineDSTResult::new(config.seed),
            engine: SortedSetEngine::with_config(store, EngineConfig::test()),
            checker: SortedSetEngine::with_config(inner, EngineConfig::test()),
            model: BTreeMap::new(),
            config,
            rng,
        }
    }

    /// Create with just a seed (uses default config)
    pub fn with_seed(seed: u64) -> Self {
        Self::new(EngineDSTConfig::new(seed))
    }

    fn random_key(&mut self) -> String {
        let idx = self.rng.gen_range(0, self.config.num_keys.max(1) as u64);
        format!("set:{}", idx)
    }

    fn random_member(&mut self) -> String {
        let idx = self.rng.gen_range(0, self.config.num_members.max(1) as u64);
        format!("m{:02}", idx)
    }

    /// Multiple of 0.25 in `[-max_delta, max_delta]`, exact in binary
    fn random_delta(&mut self) -> f64 {
        let steps = (self.config.max_delta * 4.0) as u64;
        let raw = self.rng.gen_range(0, steps * 2 + 1);
        (raw as f64 - steps as f64) / 4.0
    }

    fn random_rank(&mut self, key: &str) -> i64 {
        let len = self.model.get(key).map_or(0, BTreeMap::len) as i64;
        let span = (len + 3) as u64;
        self.rng.gen_range(0, span * 2 + 1) as i64 - span as i64
    }

    fn random_lex_bound(&mut self) -> Bound<String> {
        match self.rng.gen_range(0, 3) {
            0 => Bound::Unbounded,
            1 => Bound::Included(self.random_member()),
            _ => Bound::Excluded(self.random_member()),
        }
    }

    /// Model order: score ascending, then member
    fn ordered(&self, key: &str) -> Vec<ScoredMember> {
        let mut entries: Vec<ScoredMember> = self
            .model
            .get(key)
            .map(|set| {
                set.iter()
                    .map(|(member, score)| ScoredMember::new(member.clone(), *score))
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or_else(|| a.score.total_cmp(&b.score))
                .then_with(|| a.member.cmp(&b.member))
        });
        entries
    }

    fn members(entries: &[ScoredMember]) -> Vec<String> {
        entries.iter().map(|e| e.member.clone()).collect()
    }

    fn violation(&mut self, msg: String) {
        self.result.invariant_violations.push(format!(
            "Op #{}: {:?} - {}",
            self.result.total_operations, self.result.last_op, msg
        ));
    }

    /// Injected store errors are expected; anything else is a violation.
    fn expect_store_fault(&mut self, err: ZsetError) {
        match err {
            ZsetError::Store(e) if e.is_duplicate_key() => {
                self.violation(format!("duplicate key surfaced: {}", e));
            }
            ZsetError::Store(_) => self.result.failed_operations += 1,
            other => self.violation(format!("unexpected error: {}", other)),
        }
    }

    fn compare<T: PartialEq + std::fmt::Debug>(&mut self, what: &str, got: T, expected: T) {
        if got != expected {
            self.violation(format!("{}: got {:?}, expected {:?}", what, got, expected));
        }
    }

    async fn run_single_op(&mut self) {
        let roll = self.rng.gen_range(0, 1000) as f64 / 1000.0;
        let key = self.random_key();

        if roll < self.config.remove_prob {
            self.op_remove_lex(key).await;
        } else if roll < self.config.remove_prob + self.config.increment_prob {
            self.op_increment(key).await;
        } else {
            self.op_read(key).await;
        }

        self.result.total_operations += 1;

        if self.result.invariant_violations.is_empty() {
            if let Err(violation) = self.check_invariants().await {
                self.violation(violation);
            }
        }
    }

    async fn op_increment(&mut self, key: String) {
        let member = self.random_member();
        let delta = self.random_delta();
        self.result.last_op = Some(EngineOp::Increment {
            key: key.clone(),
            member: member.clone(),
            delta,
        });
        self.result.increments += 1;

        match self.engine.increment_by(&key, member.as_str(), delta).await {
            Ok(score) => {
                let entry = self.model.entry(key).or_default().entry(member).or_insert(0.0);
                *entry += delta;
                let expected = *entry;
                self.compare("increment result", score, expected);
            }
            Err(e) => self.expect_store_fault(e),
        }
    }

    async fn op_remove_lex(&mut self, key: String) {
        let min_bound = self.random_lex_bound();
        let max_bound = self.random_lex_bound();
        let bare = self.rng.gen_bool(0.3);
        let min = render_min(&min_bound, bare);
        let max = render_max(&max_bound, bare);
        self.result.last_op = Some(EngineOp::RemoveLex {
            key: key.clone(),
            min: min.clone(),
            max: max.clone(),
        });
        self.result.removes += 1;

        match self.engine.remove_range_by_lex(&key, &min, &max).await {
            Ok(removed) => {
                let range = (min_bound, max_bound);
                let mut expected = 0u64;
                if let Some(set) = self.model.get_mut(&key) {
                    let before = set.len();
                    set.retain(|member, _| !range.contains(member));
                    expected = (before - set.len()) as u64;
                }
                self.compare("removed count", removed, expected);
            }
            Err(e) => self.expect_store_fault(e),
        }
    }

    async fn op_read(&mut self, key: String) {
        self.result.reads += 1;
        let ordered = self.ordered(&key);

        match self.rng.gen_range(0, 4) {
            0 => {
                let start = self.random_rank(&key);
                let stop = self.random_rank(&key);
                let reverse = self.rng.gen_bool(0.5);
                self.result.last_op = Some(EngineOp::Range {
                    key: key.clone(),
                    start,
                    stop,
                    reverse,
                });
                let (got, base) = if reverse {
                    let mut desc = ordered;
                    desc.reverse();
                    (self.engine.rev_range_with_scores(key.as_str(), start, stop).await, desc)
                } else {
                    (self.engine.range_with_scores(key.as_str(), start, stop).await, ordered)
                };
                match got {
                    Ok(got) => self.compare("rank window", got, native_slice(&base, start, stop)),
                    Err(e) => self.expect_store_fault(e),
                }
            }
            1 => {
                let a = self.random_delta() * 2.0;
                let b = self.random_delta() * 2.0;
                let (min, max) = if a <= b { (a, b) } else { (b, a) };
                let start = self.rng.gen_range(0, 4);
                let count = self.rng.gen_range(0, 6) as i64 - 1;
                self.result.last_op = Some(EngineOp::RangeByScore {
                    key: key.clone(),
                    start,
                    count,
                    min,
                    max,
                });
                let in_range = ordered.iter().filter(|e| e.score >= min && e.score <= max);
                let expected: Vec<String> = match count {
                    0 => Vec::new(),
                    c if c < 0 => in_range.skip(start as usize).map(|e| e.member.clone()).collect(),
                    c => in_range
                        .skip(start as usize)
                        .take(c as usize)
                        .map(|e| e.member.clone())
                        .collect(),
                };
                match self.engine.range_by_score(key.as_str(), start, count, min, max).await {
                    Ok(got) => self.compare("score page", got, expected),
                    Err(e) => self.expect_store_fault(e),
                }
            }
            2 => {
                let min_bound = self.random_lex_bound();
                let max_bound = self.random_lex_bound();
                let min = render_min(&min_bound, false);
                let max = render_max(&max_bound, false);
                self.result.last_op = Some(EngineOp::RangeByLex {
                    key: key.clone(),
                    min: min.clone(),
                    max: max.clone(),
                });
                let range = (min_bound, max_bound);
                let expected: Vec<String> = self
                    .model
                    .get(&key)
                    .map(|set| set.keys().filter(|m| range.contains(*m)).cloned().collect())
                    .unwrap_or_default();
                match self.engine.range_by_lex(&key, &min, &max, LexPage::all()).await {
                    Ok(got) => self.compare("lex range", got, expected),
                    Err(e) => self.expect_store_fault(e),
                }
            }
            _ => {
                let member = self.random_member();
                let reverse = self.rng.gen_bool(0.5);
                self.result.last_op = Some(EngineOp::Rank {
                    key: key.clone(),
                    member: member.clone(),
                    reverse,
                });
                let position = ordered.iter().position(|e| e.member == member).map(|p| p as u64);
                let expected = position.map(|p| {
                    if reverse {
                        ordered.len() as u64 - 1 - p
                    } else {
                        p
                    }
                });
                let got = if reverse {
                    self.engine.rev_rank(&key, member.as_str()).await
                } else {
                    self.engine.rank(&key, member.as_str()).await
                };
                match got {
                    Ok(got) => self.compare("rank", got, expected),
                    Err(e) => self.expect_store_fault(e),
                }
            }
        }
    }

    /// Check all invariants for every set, through the fault-free view
    async fn check_invariants(&self) -> Result<(), String> {
        for idx in 0..self.config.num_keys.max(1) {
            let key = format!("set:{}", idx);
            let expected = self.ordered(&key);
            let err = |e: ZsetError| format!("checker read on {} failed: {}", key, e);

            // Invariant 1: full range matches the model order
            let full = self.checker.range_with_scores(key.as_str(), 0, -1).await.map_err(err)?;
            if full != expected {
                return Err(format!("{} order mismatch: got {:?}, expected {:?}", key, full, expected));
            }

            // Invariant 2: rev_range is the exact reverse
            let mut rev = self.checker.rev_range(key.as_str(), 0, -1).await.map_err(err)?;
            rev.reverse();
            if rev != Self::members(&expected) {
                return Err(format!("{} rev_range is not the reverse of range", key));
            }

            // Invariant 3: cardinality
            let card = self.checker.card(&key).await.map_err(err)?;
            if card != expected.len() as u64 {
                return Err(format!("{} card {} != model {}", key, card, expected.len()));
            }

            // Invariant 4: score and rank agree with position
            for (position, entry) in expected.iter().enumerate() {
                let score = self.checker.score(&key, entry.member.as_str()).await.map_err(err)?;
                if score != Some(entry.score) {
                    return Err(format!(
                        "{} score of {}: got {:?}, expected {}",
                        key, entry.member, score, entry.score
                    ));
                }
                let rank = self.checker.rank(&key, entry.member.as_str()).await.map_err(err)?;
                if rank != Some(position as u64) {
                    return Err(format!(
                        "{} rank of {}: got {:?}, expected {}",
                        key, entry.member, rank, position
                    ));
                }
            }
        }
        Ok(())
    }

    /// Run specified number of operations
    pub async fn run(&mut self, operations: usize) {
        for _ in 0..operations {
            self.run_single_op().await;

            // Stop early if we hit a violation
            if !self.result.invariant_violations.is_empty() {
                break;
            }
        }
        self.result.duplicate_keys_injected = self.engine.store().stats().duplicate_keys_injected;
    }

    /// Get the result
    pub fn result(&self) -> &EngineDSTResult {
        &self.result
    }

    /// Get the engine for inspection
    pub fn engine(&self) -> &SortedSetEngine<SimStore> {
        &self.engine
    }
}

/// Run a batch of DST tests with different seeds
pub async fn run_engine_dst_batch(
    start_seed: u64,
    num_seeds: usize,
    ops_per_seed: usize,
    config_fn: fn(u64) -> EngineDSTConfig,
) -> Vec<EngineDSTResult> {
    let mut results = Vec::with_capacity(num_seeds);
    for i in 0..num_seeds {
        let seed = start_seed + i as u64;
        let mut harness = SortedSetEngineDSTHarness::new(config_fn(seed));
        harness.run(ops_per_seed).await;
        results.push(harness.result().clone());
    }
    results
}

/// Summarize batch results
pub fn summarize_batch(results: &[EngineDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed = total - passed;
    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();
    let failed_ops: u64 = results.iter().map(|r| r.failed_operations).sum();

    let mut summary = format!(
        "Sorted Set Engine DST Summary\n\
         =============================\n\
         Seeds: {} total, {} passed, {} failed\n\
         Total operations: {} ({} failed by injected faults)\n",
        total, passed, failed, total_ops, failed_ops
    );

    if failed > 0 {
        summary.push_str("\nFailed seeds:\n");
        for result in results.iter().filter(|r| !r.is_success()) {
            summary.push_str(&format!("  Seed {}: {}\n", result.seed, result.summary()));
            for violation in &result.invariant_violations {
                summary.push_str(&format!("    - {}\n", violation));
            }
        }
    }

    summary
}
