//! Fault configuration
//!
//! Call sites carry their own base probability (from `SimulatedStoreConfig`);
//! the config only turns injection on or off and scales individual faults.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Master switch
    pub enabled: bool,
    /// Per-fault probability multipliers (missing = 1.0)
    pub multipliers: HashMap<&'static str, f64>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        FaultConfig {
            enabled: true,
            multipliers: HashMap::new(),
        }
    }
}

impl FaultConfig {
    /// No faults fire
    pub fn disabled() -> Self {
        FaultConfig {
            enabled: false,
            multipliers: HashMap::new(),
        }
    }

    pub fn with_multiplier(mut self, fault_id: &'static str, multiplier: f64) -> Self {
        self.multipliers.insert(fault_id, multiplier.max(0.0));
        self
    }

    pub fn multiplier_for(&self, fault_id: &str) -> f64 {
        self.multipliers.get(fault_id).copied().unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buggify::faults::document_store;

    #[test]
    fn test_default_multiplier() {
        let config = FaultConfig::default();
        assert!(config.enabled);
        assert!((config.multiplier_for(document_store::FIND_FAIL) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_multiplier_clamped() {
        let config = FaultConfig::default().with_multiplier(document_store::LATENCY, -3.0);
        assert_eq!(config.multiplier_for(document_store::LATENCY), 0.0);
    }
}
