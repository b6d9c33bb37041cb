//! Ledger and commit simulator configuration.
//!
//! ```toml
//! status_buffer = 8
//! id_seed = 7
//!
//! [commit]
//! submit_latency_ms = 300
//! confirm_latency_ms = 700
//! failure_rate = 0.05
//! seed = 42
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Simulated external commit behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommitConfig {
    /// Delay before the submission is acknowledged
    pub submit_latency_ms: u64,
    /// Delay between acknowledgement and confirmation
    pub confirm_latency_ms: u64,
    /// Probability (0.0 - 1.0) that a commit fails
    pub failure_rate: f64,
    /// Seed for transaction references and failures; `None` uses entropy
    pub seed: Option<u64>,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            submit_latency_ms: 300,
            confirm_latency_ms: 700,
            failure_rate: 0.0,
            seed: None,
        }
    }
}

impl CommitConfig {
    /// Zero-latency, never-failing, seeded config.
    pub fn instant(seed: u64) -> Self {
        Self {
            submit_latency_ms: 0,
            confirm_latency_ms: 0,
            failure_rate: 0.0,
            seed: Some(seed),
        }
    }

    /// Zero-latency config that fails every commit.
    pub fn always_failing(seed: u64) -> Self {
        Self {
            failure_rate: 1.0,
            ..Self::instant(seed)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ConfigError::Invalid(format!(
                "failure_rate must be within [0, 1], got {}",
                self.failure_rate
            )));
        }
        Ok(())
    }
}

/// Prediction ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub commit: CommitConfig,
    /// Capacity of progress channels handed out by callers
    pub status_buffer: usize,
    /// Seed for subject/entry ids; `None` uses entropy
    pub id_seed: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            commit: CommitConfig::default(),
            status_buffer: 8,
            id_seed: None,
        }
    }
}

impl LedgerConfig {
    /// Fully reproducible, zero-latency configuration.
    pub fn deterministic(seed: u64) -> Self {
        Self {
            commit: CommitConfig::instant(seed),
            status_buffer: 8,
            id_seed: Some(seed),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.commit.validate()?;
        if self.status_buffer == 0 {
            return Err(ConfigError::Invalid("status_buffer must be at least 1".into()));
        }
        Ok(())
    }
}
