//! Keeper configuration.
//!
//! - [`KeeperConfig`]: connection settings and secrets from the environment
//! - [`KeeperSettings`]: tunables (batch sizes, gas limit, intervals) from TOML
//! - [`ChainCatalog`]: per-chain pools, strategies and oracles

mod catalog;
mod env;
mod settings;

use thiserror::Error;

pub use catalog::{expand_env, ApySource, ChainCatalog, OracleEntry, StrategyEntry};
pub use env::{KeeperConfig, TelegramSettings, DEV_CHAIN_ID, DEV_PRIVATE_KEY};
pub use settings::{KeeperSettings, LiquidationSettings, OracleSettings, SyncSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {message}")]
    Env { key: &'static str, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("no catalog for chain {0}")]
    UnknownChain(u64),

    #[error("{0}")]
    Invalid(String),
}
