//! Recovery configuration
//!
//! Loaded from TOML, optionally overridden by `CUSTODY_` environment variables,
//! then validated before use.

use crate::keyset::BitcoinNetworkType;
use crate::{CustodyError, CustodyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix for environment overrides, e.g. `CUSTODY_STATUS_POLL_INTERVAL_MS`.
pub const ENV_PREFIX: &str = "CUSTODY_";

/// Configuration for the recovery synchronizer and orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Delay between server status polls while foregrounded
    pub status_poll_interval_ms: u64,
    /// Wall-clock floor for auth key rotation
    pub minimum_rotation_duration_ms: u64,
    /// Network used for newly created keysets
    pub network: BitcoinNetworkType,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            status_poll_interval_ms: 5_000,
            minimum_rotation_duration_ms: 2_000,
            network: BitcoinNetworkType::Bitcoin,
        }
    }
}

impl RecoveryConfig {
    /// Create config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poll interval
    pub fn with_status_poll_interval(mut self, interval: Duration) -> Self {
        self.status_poll_interval_ms = duration_ms(interval);
        self
    }

    /// Set the rotation floor
    pub fn with_minimum_rotation_duration(mut self, duration: Duration) -> Self {
        self.minimum_rotation_duration_ms = duration_ms(duration);
        self
    }

    /// Set the network
    pub fn with_network(mut self, network: BitcoinNetworkType) -> Self {
        self.network = network;
        self
    }

    /// Poll interval as a duration.
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    /// Rotation floor as a duration.
    pub fn minimum_rotation_duration(&self) -> Duration {
        Duration::from_millis(self.minimum_rotation_duration_ms)
    }

    /// Parse from TOML text and validate.
    pub fn from_toml_str(text: &str) -> CustodyResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| CustodyError::invalid(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> CustodyResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CustodyError::internal(format!("Failed to read config file: {e}")))?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "loaded recovery config");
        Ok(config)
    }

    /// Apply `CUSTODY_*` environment overrides.
    pub fn merge_with_env(&mut self) -> CustodyResult<()> {
        self.merge_with_vars(std::env::vars())
    }

    fn merge_with_vars(&mut self, vars: impl Iterator<Item = (String, String)>) -> CustodyResult<()> {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "STATUS_POLL_INTERVAL_MS" => self.status_poll_interval_ms = parse_ms(&key, &value)?,
                "MINIMUM_ROTATION_DURATION_MS" => {
                    self.minimum_rotation_duration_ms = parse_ms(&key, &value)?;
                }
                "NETWORK" => {
                    self.network = serde_json::from_value(serde_json::Value::String(
                        value.to_uppercase(),
                    ))
                    .map_err(|e| CustodyError::invalid(format!("{key}: {e}")))?;
                }
                _ => {
                    warn!(%key, "ignoring unknown environment override");
                    continue;
                }
            }
            debug!(%key, "applied environment override");
        }
        self.validate()
    }

    /// Validate the configuration
    pub fn validate(&self) -> CustodyResult<()> {
        if self.status_poll_interval_ms == 0 {
            return Err(CustodyError::invalid(
                "status_poll_interval_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse_ms(key: &str, value: &str) -> CustodyResult<u64> {
    value
        .parse()
        .map_err(|e| CustodyError::invalid(format!("{key}: {e}")))
}
