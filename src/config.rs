//! Relay configuration — timing and heuristic tunables.
//!
//! None of these affect relay correctness, only how patient or polite the
//! run is toward the remote agents. Values can come from a TOML file, from
//! `RELAY_*` environment variables, or from the defaults, which match the
//! field-tuned numbers of the original controller.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detector::DetectorConfig;

/// Configuration load/validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// All recognized relay tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Exchanges per round.
    pub exchange_limit: u32,
    /// Seconds between output samples while waiting on a reply.
    pub poll_interval_secs: u64,
    /// Consecutive identical samples required to call a reply finished.
    pub stability_threshold: u32,
    /// Minimum reply length, in characters, to count as a real response.
    pub min_response_length: usize,
    /// Ceiling on waiting for a single reply.
    pub max_wait_secs: u64,
    /// Pause between rounds. Politeness toward the remote agents.
    pub inter_round_delay_secs: u64,
    /// Pause after each delivered message.
    pub after_send_delay_secs: u64,
    /// Pause between receiving a reply and forwarding it.
    pub between_exchange_delay_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            exchange_limit: 3,
            poll_interval_secs: 2,
            stability_threshold: 3,
            min_response_length: 50,
            max_wait_secs: 120,
            inter_round_delay_secs: 10,
            after_send_delay_secs: 4,
            between_exchange_delay_secs: 4,
        }
    }
}

impl RelayConfig {
    /// Load from a TOML file. Unknown keys are ignored; missing keys fall
    /// back to defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by any `RELAY_*` environment variables present.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        fn read<T: std::str::FromStr>(name: &str, slot: &mut T) {
            if let Ok(raw) = std::env::var(name) {
                if let Ok(parsed) = raw.parse() {
                    *slot = parsed;
                }
            }
        }

        read("RELAY_EXCHANGE_LIMIT", &mut config.exchange_limit);
        read("RELAY_POLL_INTERVAL_SECS", &mut config.poll_interval_secs);
        read("RELAY_STABILITY_THRESHOLD", &mut config.stability_threshold);
        read("RELAY_MIN_RESPONSE_LENGTH", &mut config.min_response_length);
        read("RELAY_MAX_WAIT_SECS", &mut config.max_wait_secs);
        read("RELAY_INTER_ROUND_DELAY_SECS", &mut config.inter_round_delay_secs);
        read("RELAY_AFTER_SEND_DELAY_SECS", &mut config.after_send_delay_secs);
        read(
            "RELAY_BETWEEN_EXCHANGE_DELAY_SECS",
            &mut config.between_exchange_delay_secs,
        );

        config
    }

    /// Reject configurations the relay cannot meaningfully run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange_limit == 0 {
            return Err(ConfigError::Invalid(
                "exchange_limit must be at least 1".to_string(),
            ));
        }
        if self.stability_threshold == 0 {
            return Err(ConfigError::Invalid(
                "stability_threshold must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.max_wait_secs <= self.poll_interval_secs {
            return Err(ConfigError::Invalid(
                "max_wait_secs must exceed poll_interval_secs".to_string(),
            ));
        }
        Ok(())
    }

    /// Detector tunables derived from this config.
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            min_length: self.min_response_length,
            stability_threshold: self.stability_threshold,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }

    pub fn inter_round_delay(&self) -> Duration {
        Duration::from_secs(self.inter_round_delay_secs)
    }

    pub fn after_send_delay(&self) -> Duration {
        Duration::from_secs(self.after_send_delay_secs)
    }

    pub fn between_exchange_delay(&self) -> Duration {
        Duration::from_secs(self.between_exchange_delay_secs)
    }
}
