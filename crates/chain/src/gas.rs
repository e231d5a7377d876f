//! Fee pricing for keeper transactions.
//!
//! The chain catalog names the fee model. Local nodes take a plain
//! `gasPrice`; Arbitrum takes EIP-1559 fields. Either way the node's current
//! suggestion is capped by the catalog before it goes on the transaction.

use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use serde::Deserialize;

use crate::error::ChainError;

const GWEI: u128 = 1_000_000_000;

/// Fee model as written in a chain catalog.
///
/// ```toml
/// [gas]
/// model = "eip1559"
/// priority_fee_gwei = 1
/// max_fee_gwei = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum GasPricing {
    Legacy {
        #[serde(default = "default_max_gwei")]
        max_gas_price_gwei: u64,
    },
    Eip1559 {
        #[serde(default = "default_priority_fee_gwei")]
        priority_fee_gwei: u64,
        #[serde(default = "default_max_gwei")]
        max_fee_gwei: u64,
    },
}

fn default_max_gwei() -> u64 {
    100
}

fn default_priority_fee_gwei() -> u64 {
    1
}

impl Default for GasPricing {
    fn default() -> Self {
        GasPricing::Legacy {
            max_gas_price_gwei: default_max_gwei(),
        }
    }
}

/// Fees resolved for one keeper transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeQuote {
    GasPrice(u128),
    Eip1559 { max_fee: u128, priority_fee: u128 },
}

impl GasPricing {
    pub fn model(&self) -> &'static str {
        match self {
            GasPricing::Legacy { .. } => "legacy",
            GasPricing::Eip1559 { .. } => "eip1559",
        }
    }

    /// Ask the node for current fees and cap them.
    pub async fn quote<P: Provider>(&self, provider: &P) -> Result<FeeQuote, ChainError> {
        match *self {
            GasPricing::Legacy { max_gas_price_gwei } => {
                let suggested = provider.get_gas_price().await?;
                Ok(FeeQuote::GasPrice(suggested.min(max_gas_price_gwei as u128 * GWEI)))
            }
            GasPricing::Eip1559 {
                priority_fee_gwei,
                max_fee_gwei,
            } => {
                let block = provider
                    .get_block_by_number(BlockNumberOrTag::Latest)
                    .await?
                    .ok_or_else(|| ChainError::Transport("latest block unavailable".to_string()))?;
                let base_fee = block.header.base_fee_per_gas.unwrap_or_default() as u128;
                Ok(eip1559_quote(base_fee, priority_fee_gwei, max_fee_gwei))
            }
        }
    }
}

/// `maxFeePerGas = 2 * baseFee + tip`, capped.
fn eip1559_quote(base_fee: u128, priority_fee_gwei: u64, max_fee_gwei: u64) -> FeeQuote {
    let cap = max_fee_gwei as u128 * GWEI;
    let max_fee = base_fee
        .saturating_mul(2)
        .saturating_add(priority_fee_gwei as u128 * GWEI)
        .min(cap);
    FeeQuote::Eip1559 {
        max_fee,
        priority_fee: (priority_fee_gwei as u128 * GWEI).min(max_fee),
    }
}

impl FeeQuote {
    pub fn apply(self, tx: &mut TransactionRequest) {
        match self {
            FeeQuote::GasPrice(price) => tx.set_gas_price(price),
            FeeQuote::Eip1559 {
                max_fee,
                priority_fee,
            } => {
                tx.set_max_fee_per_gas(max_fee);
                tx.set_max_priority_fee_per_gas(priority_fee);
            }
        }
    }

    /// Highest price per gas unit this quote can pay, in gwei.
    pub fn ceiling_gwei(&self) -> u128 {
        match self {
            FeeQuote::GasPrice(price) => price / GWEI,
            FeeQuote::Eip1559 { max_fee, .. } => max_fee / GWEI,
        }
    }
}
