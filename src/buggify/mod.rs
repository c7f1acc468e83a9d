//! BUGGIFY - FoundationDB-Style Fault Injection
//!
//! Deterministic, reproducible fault injection for the simulated document
//! store. Every decision point in `SimulatedDocumentStore` is an injection
//! site; given the same seed, faults fire at the same places.
//!
//! ```ignore
//! use crate::buggify::faults::document_store as faults;
//!
//! if buggify!(&mut rng, faults::FIND_FAIL, config.find_fail_prob) {
//!     return Err(StoreError::Unavailable("injected".into()));
//! }
//! ```
//!
//! Probabilities passed at the call site are scaled by the thread's
//! [`FaultConfig`]; a disabled config or an active [`BuggifySuppressor`]
//! turns every site off.

pub mod config;
pub mod faults;

pub use config::FaultConfig;
pub use faults::ALL_FAULTS;

use std::cell::RefCell;
use std::collections::HashMap;

/// Per-fault check/trigger counters
#[derive(Debug, Clone, Default)]
pub struct BuggifyStats {
    pub checks: HashMap<&'static str, u64>,
    pub triggers: HashMap<&'static str, u64>,
}

impl BuggifyStats {
    pub fn triggered(&self, fault_id: &str) -> u64 {
        self.triggers.get(fault_id).copied().unwrap_or(0)
    }

    /// One line per known fault, including faults never checked
    pub fn summary(&self) -> String {
        let mut lines = vec!["BUGGIFY Statistics:".to_string()];
        for id in ALL_FAULTS {
            let checks = self.checks.get(id).copied().unwrap_or(0);
            lines.push(format!("  {}: {}/{}", id, self.triggered(id), checks));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Default)]
struct BuggifyContext {
    config: FaultConfig,
    stats: BuggifyStats,
    suppressed: bool,
}

thread_local! {
    static BUGGIFY_CONTEXT: RefCell<BuggifyContext> = RefCell::new(BuggifyContext::default());
}

/// Set the fault configuration for the current thread
pub fn set_config(config: FaultConfig) {
    BUGGIFY_CONTEXT.with(|ctx| ctx.borrow_mut().config = config);
}

/// Snapshot of the current thread's stats
pub fn get_stats() -> BuggifyStats {
    BUGGIFY_CONTEXT.with(|ctx| ctx.borrow().stats.clone())
}

pub fn reset_stats() {
    BUGGIFY_CONTEXT.with(|ctx| ctx.borrow_mut().stats = BuggifyStats::default());
}

/// Disables injection until dropped
pub struct BuggifySuppressor {
    previous: bool,
}

impl BuggifySuppressor {
    pub fn new() -> Self {
        let previous = BUGGIFY_CONTEXT.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            std::mem::replace(&mut ctx.suppressed, true)
        });
        BuggifySuppressor { previous }
    }
}

impl Default for BuggifySuppressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BuggifySuppressor {
    fn drop(&mut self) {
        let previous = self.previous;
        BUGGIFY_CONTEXT.with(|ctx| ctx.borrow_mut().suppressed = previous);
    }
}

/// Decide whether `fault_id` fires, drawing from `rng` for determinism.
///
/// Called through the [`buggify!`] macro.
#[inline]
pub fn should_buggify_with_prob<R: crate::io::Rng>(
    rng: &mut R,
    fault_id: &'static str,
    probability: f64,
) -> bool {
    BUGGIFY_CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        *ctx.stats.checks.entry(fault_id).or_insert(0) += 1;

        if ctx.suppressed || !ctx.config.enabled {
            return false;
        }

        let prob = (probability * ctx.config.multiplier_for(fault_id)).clamp(0.0, 1.0);
        if prob <= 0.0 {
            return false;
        }

        // Always draw so the RNG stream does not depend on earlier outcomes
        let roll = rng.gen_range(0, 1_000_000) as f64 / 1_000_000.0;
        let triggered = roll < prob;
        if triggered {
            *ctx.stats.triggers.entry(fault_id).or_insert(0) += 1;
        }
        triggered
    })
}

/// BUGGIFY macro - the interface for fault injection
#[macro_export]
macro_rules! buggify {
    ($rng:expr, $fault_id:expr, $prob:expr) => {
        $crate::buggify::should_buggify_with_prob($rng, $fault_id, $prob)
    };
}

/// Suppress all buggify calls within a scope
#[macro_export]
macro_rules! suppress_buggify {
    () => {
        $crate::buggify::BuggifySuppressor::new()
    };
}
