//! Engine Configuration
//!
//! Defaults for bulk processing and the increment retry loop. Loaded from a
//! TOML file, then overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `ZSET_BATCH_SIZE` | `process.batch_size` |
//! | `ZSET_INTERVAL_MS` | `process.interval` |
//! | `ZSET_WITH_SCORES` | `process.with_scores` |
//! | `ZSET_WARN_AFTER_RETRIES` | `increment.warn_after_retries` |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Defaults for `process_all`
    pub process: ProcessConfig,
    /// Increment-and-insert retry loop
    pub increment: IncrementConfig,
}

/// Bulk cursor processing defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Maximum entries per sink call (default: 100)
    pub batch_size: usize,
    /// Pause between batches (default: none)
    #[serde(with = "duration_millis")]
    pub interval: Duration,
    /// Hand scores to the sink along with members
    pub with_scores: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        ProcessConfig {
            batch_size: 100,
            interval: Duration::ZERO,
            with_scores: false,
        }
    }
}

/// Increment retry loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementConfig {
    /// Consecutive duplicate-key retries before logging at warn level.
    /// Retries themselves are never capped.
    pub warn_after_retries: u32,
}

impl Default for IncrementConfig {
    fn default() -> Self {
        IncrementConfig {
            warn_after_retries: 16,
        }
    }
}

/// Error loading configuration
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config I/O error: {}", e),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl EngineConfig {
    /// Configuration for tests (small batches, no pacing, early warnings)
    pub fn test() -> Self {
        EngineConfig {
            process: ProcessConfig {
                batch_size: 10,
                interval: Duration::ZERO,
                with_scores: false,
            },
            increment: IncrementConfig {
                warn_after_retries: 4,
            },
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Apply `ZSET_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply `ZSET_*` overrides from an arbitrary lookup
    pub fn apply_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("ZSET_BATCH_SIZE") {
            self.process.batch_size = parse_var("ZSET_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("ZSET_INTERVAL_MS") {
            self.process.interval = Duration::from_millis(parse_var("ZSET_INTERVAL_MS", &v)?);
        }
        if let Some(v) = lookup("ZSET_WITH_SCORES") {
            self.process.with_scores = v == "true" || v == "1";
        }
        if let Some(v) = lookup("ZSET_WARN_AFTER_RETRIES") {
            self.increment.warn_after_retries = parse_var("ZSET_WARN_AFTER_RETRIES", &v)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process.batch_size == 0 {
            return Err(ConfigError::Invalid("process.batch_size must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{}={:?}", name, value)))
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
