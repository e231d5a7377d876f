//! Keeper tunables with serde defaults.
//!
//! All fields are optional in the TOML file:
//!
//! ```toml
//! [sync]
//! batch_blocks = 500000
//!
//! [liquidation]
//! kill_batch_size = 3
//!
//! [intervals]
//! strategies = 0   # manual only
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::ConfigError;
use crate::tasks::DEFAULT_INTERVALS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeeperSettings {
    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub liquidation: LiquidationSettings,

    #[serde(default)]
    pub oracles: OracleSettings,

    /// Per-task interval overrides in minutes; 0 makes a task manual-only
    #[serde(default)]
    pub intervals: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Block span of one `eth_getLogs` page
    #[serde(default = "default_batch_blocks")]
    pub batch_blocks: u64,
}

fn default_batch_blocks() -> u64 {
    1_000_000
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_blocks: default_batch_blocks(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationSettings {
    /// Positions per `lifeBatched` read
    #[serde(default = "default_read_batch_size")]
    pub read_batch_size: usize,

    /// Positions per `killBatched` transaction
    #[serde(default = "default_kill_batch_size")]
    pub kill_batch_size: usize,

    #[serde(default = "default_kill_gas_limit")]
    pub kill_gas_limit: u64,
}

fn default_read_batch_size() -> usize {
    100
}
fn default_kill_batch_size() -> usize {
    5
}
fn default_kill_gas_limit() -> u64 {
    10_000_000
}

impl Default for LiquidationSettings {
    fn default() -> Self {
        Self {
            read_batch_size: default_read_batch_size(),
            kill_batch_size: default_kill_batch_size(),
            kill_gas_limit: default_kill_gas_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSettings {
    /// Seconds after `lastTimestamp` before an oracle is refreshed
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
}

fn default_staleness_secs() -> u64 {
    1800
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
        }
    }
}

impl Default for KeeperSettings {
    fn default() -> Self {
        Self {
            sync: SyncSettings::default(),
            liquidation: LiquidationSettings::default(),
            oracles: OracleSettings::default(),
            intervals: BTreeMap::new(),
        }
    }
}

impl KeeperSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.batch_blocks == 0 {
            return Err(ConfigError::Invalid("sync.batch_blocks must be > 0".into()));
        }
        if self.liquidation.read_batch_size == 0 || self.liquidation.kill_batch_size == 0 {
            return Err(ConfigError::Invalid("liquidation batch sizes must be > 0".into()));
        }
        if let Some(unknown) = self
            .intervals
            .keys()
            .find(|key| !DEFAULT_INTERVALS.iter().any(|(id, _)| *id == key.as_str()))
        {
            let known: Vec<_> = DEFAULT_INTERVALS.iter().map(|(id, _)| *id).collect();
            return Err(ConfigError::Invalid(format!(
                "unknown task `{unknown}` in [intervals], expected one of {}",
                known.join(", ")
            )));
        }
        Ok(())
    }

    /// Interval for a task: override if present, else the built-in default.
    pub fn interval_for(&self, task: &str, default_minutes: u32) -> u32 {
        self.intervals.get(task).copied().unwrap_or(default_minutes)
    }

    pub fn log_settings(&self) {
        tracing::info!(
            batch_blocks = self.sync.batch_blocks,
            read_batch = self.liquidation.read_batch_size,
            kill_batch = self.liquidation.kill_batch_size,
            kill_gas_limit = self.liquidation.kill_gas_limit,
            oracle_staleness_secs = self.oracles.staleness_secs,
            overrides = self.intervals.len(),
            "Keeper settings"
        );
    }
}
