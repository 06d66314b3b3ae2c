//! Engine configuration.

use saga_rules::RulesConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::narrative::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Everything the turn engine can be tuned with. Missing keys fall back to
/// the defaults.
///
/// ```toml
/// victory_turns = 25
/// retry_delays_ms = [1000, 2000]
///
/// [rules]
/// inventory_capacity = 40
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rules: RulesConfig,

    /// Player actions after which the quest is forced complete.
    pub victory_turns: u32,

    /// Story entries included in each prompt.
    pub context_entries: usize,

    /// World facts included in each prompt.
    pub prompt_facts: usize,

    /// Delays before each retry of a failed generation.
    pub retry_delays_ms: Vec<u64>,

    /// Draw consequence damage from the tier's range instead of its midpoint.
    pub damage_variance: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules: RulesConfig::default(),
            victory_turns: 20,
            context_entries: 8,
            prompt_facts: 10,
            retry_delays_ms: vec![2000, 4000, 8000],
            damage_variance: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}
