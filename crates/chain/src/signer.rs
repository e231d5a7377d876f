//! Keeper wallet: local key, catalog fee pricing, one transaction at a time.

use std::time::Instant;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use tracing::{debug, info, warn};

use crate::client::{Confirmation, WriteOptions};
use crate::error::ChainError;
use crate::gas::GasPricing;

/// Signs keeper calls (kills, oracle updates, harvests) with the configured key.
///
/// The nonce is left to the node on every send.
#[derive(Clone)]
pub struct KeeperWallet {
    wallet: EthereumWallet,
    address: Address,
    chain_id: u64,
    pricing: GasPricing,
}

impl KeeperWallet {
    pub fn from_key(private_key: &str, chain_id: u64, pricing: GasPricing) -> Result<Self, ChainError> {
        let signer: PrivateKeySigner = private_key
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| ChainError::Config(format!("invalid private key: {e}")))?;
        let address = signer.address();

        Ok(Self {
            wallet: EthereumWallet::from(signer),
            address,
            chain_id,
            pricing,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn pricing(&self) -> &GasPricing {
        &self.pricing
    }

    /// Unsigned request for `calldata`, before fees are quoted.
    fn request(&self, to: Address, calldata: Bytes, gas_limit: Option<u64>) -> TransactionRequest {
        let tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_input(calldata)
            .with_chain_id(self.chain_id);
        match gas_limit {
            Some(limit) => tx.with_gas_limit(limit),
            None => tx,
        }
    }

    /// Sign and send. Returns the hash once `options.confirmation` is met.
    pub async fn send(
        &self,
        rpc_url: &Url,
        to: Address,
        calldata: Bytes,
        options: WriteOptions,
    ) -> Result<B256, ChainError> {
        let started = Instant::now();
        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(rpc_url.clone());

        let fees = self.pricing.quote(&provider).await?;
        let mut tx = self.request(to, calldata, options.gas_limit);
        fees.apply(&mut tx);
        debug!(
            to = %to,
            gas_limit = ?options.gas_limit,
            fee_ceiling_gwei = fees.ceiling_gwei(),
            "Signing keeper transaction"
        );

        let pending = provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();

        match options.confirmation {
            Confirmation::Submitted => {
                info!(tx_hash = %tx_hash, elapsed_ms = started.elapsed().as_millis(), "Submitted");
                Ok(tx_hash)
            }
            Confirmation::Mined => {
                let receipt = pending
                    .get_receipt()
                    .await
                    .map_err(|e| ChainError::Transport(e.to_string()))?;
                if !receipt.status() {
                    warn!(tx_hash = %tx_hash, "Keeper transaction reverted");
                    return Err(ChainError::Reverted(tx_hash));
                }
                info!(
                    tx_hash = %tx_hash,
                    block = receipt.block_number.unwrap_or_default(),
                    gas_used = receipt.gas_used,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Mined"
                );
                Ok(tx_hash)
            }
        }
    }
}

impl std::fmt::Debug for KeeperWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeeperWallet")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("gas", &self.pricing.model())
            .finish_non_exhaustive()
    }
}
