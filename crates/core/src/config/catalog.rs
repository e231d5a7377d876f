//! Per-chain contract catalogs.
//!
//! A catalog lists what the keeper watches on one chain: the block to start
//! scanning from, lending pools, yield strategies with their APY source, and
//! keeper-updated oracles. Catalogs are read from `<CONFIG_DIR>/chains/<id>.toml`
//! when present, otherwise from the copies built into the binary.

use alloy::primitives::Address;
use keeper_chain::GasPricing;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use super::ConfigError;

const BUILTIN_CATALOGS: &[(u64, &str)] = &[
    (1337, include_str!("../../../../config/chains/1337.toml")),
    (42161, include_str!("../../../../config/chains/42161.toml")),
];

#[derive(Debug, Clone, Deserialize)]
pub struct ChainCatalog {
    pub chain_id: u64,
    pub name: String,
    /// Cursor used when no event has been ingested yet
    pub genesis_block: u64,
    #[serde(default)]
    pub gas: GasPricing,
    #[serde(default)]
    pub pools: Vec<Address>,
    #[serde(default)]
    pub strategies: Vec<StrategyEntry>,
    #[serde(default)]
    pub oracles: Vec<OracleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyEntry {
    pub address: Address,
    #[serde(default)]
    pub label: Option<String>,
    pub apy: ApySource,
}

/// Where the APY API should look a strategy up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApySource {
    /// Upstream name, e.g. `defillama`
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleEntry {
    pub address: Address,
    #[serde(default)]
    pub label: Option<String>,
}

impl ChainCatalog {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env(content)?;
        Ok(toml::from_str(&expanded)?)
    }

    /// Load the catalog for `chain_id`, preferring `config_dir` over built-ins.
    pub fn load(chain_id: u64, config_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let catalog = match config_dir.map(|dir| dir.join("chains").join(format!("{chain_id}.toml"))) {
            Some(path) if path.exists() => {
                debug!(file = %path.display(), "Loading chain catalog from disk");
                let content =
                    std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                        path: path.display().to_string(),
                        source,
                    })?;
                Self::from_toml(&content)?
            }
            _ => {
                let content = BUILTIN_CATALOGS
                    .iter()
                    .find(|(id, _)| *id == chain_id)
                    .map(|(_, content)| *content)
                    .ok_or(ConfigError::UnknownChain(chain_id))?;
                Self::from_toml(content)?
            }
        };

        if catalog.chain_id != chain_id {
            return Err(ConfigError::Invalid(format!(
                "catalog declares chain {} but {} was requested",
                catalog.chain_id, chain_id
            )));
        }

        info!(
            chain_id,
            name = %catalog.name,
            genesis_block = catalog.genesis_block,
            pools = catalog.pools.len(),
            strategies = catalog.strategies.len(),
            oracles = catalog.oracles.len(),
            "Chain catalog loaded"
        );
        Ok(catalog)
    }

    pub fn strategy_addresses(&self) -> Vec<Address> {
        self.strategies.iter().map(|s| s.address).collect()
    }
}

/// Replace `${VAR}` with the variable's value; unknown variables are kept.
pub fn expand_env(s: &str) -> Result<String, ConfigError> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        if let (Some(full), Some(name)) = (cap.get(0), cap.get(1)) {
            if let Ok(value) = std::env::var(name.as_str()) {
                result = result.replace(full.as_str(), &value);
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalogs_parse() {
        let local = ChainCatalog::load(1337, None).unwrap();
        assert_eq!(local.genesis_block, 0);
        assert_eq!(local.pools.len(), 2);
        assert_eq!(local.strategies.len(), 1);

        let arbitrum = ChainCatalog::load(42161, None).unwrap();
        assert_eq!(arbitrum.genesis_block, 45_874_599);
        assert_eq!(arbitrum.strategies.len(), 17);
        assert_eq!(arbitrum.oracles.len(), 5);
        assert!(matches!(arbitrum.gas, GasPricing::Eip1559 { .. }));
        assert_eq!(
            arbitrum.strategies[1].apy,
            ApySource {
                kind: "plutus".to_string(),
                id: "plvglp".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_chain() {
        assert!(matches!(
            ChainCatalog::load(5, None),
            Err(ConfigError::UnknownChain(5))
        ));
    }

    #[test]
    fn test_expand_env() {
        std::env::set_var("KEEPER_CATALOG_TEST_VAR", "0x59b670e9fa9d0a427751af201d676719a970857b");
        assert_eq!(
            expand_env("address = \"${KEEPER_CATALOG_TEST_VAR}\"").unwrap(),
            "address = \"0x59b670e9fa9d0a427751af201d676719a970857b\""
        );
        assert_eq!(expand_env("literal").unwrap(), "literal");
        assert_eq!(expand_env("${KEEPER_NONEXISTENT}").unwrap(), "${KEEPER_NONEXISTENT}");
    }

    #[test]
    fn test_catalog_from_disk_overrides_builtin() {
        let dir = std::env::temp_dir().join(format!("keeper-catalog-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("chains")).unwrap();
        std::fs::write(
            dir.join("chains").join("1337.toml"),
            "chain_id = 1337\nname = \"dev\"\ngenesis_block = 42\n",
        )
        .unwrap();

        let catalog = ChainCatalog::load(1337, Some(&dir)).unwrap();
        assert_eq!(catalog.genesis_block, 42);
        assert!(catalog.pools.is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
