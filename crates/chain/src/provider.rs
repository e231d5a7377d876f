//! HTTP JSON-RPC implementation of [`ChainClient`] on alloy providers.

use alloy::dyn_abi::DynSolValue;
use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, TransactionRequest};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::call::CallSpec;
use crate::client::{ChainClient, ChainLog, LogQuery, WriteOptions};
use crate::error::ChainError;
use crate::gas::GasPricing;
use crate::signer::KeeperWallet;

/// Chain client for one RPC endpoint and one signing key.
#[derive(Debug)]
pub struct AlloyChainClient {
    rpc_url: Url,
    chain_id: u64,
    wallet: KeeperWallet,
}

impl AlloyChainClient {
    /// Build the client without touching the network.
    ///
    /// An unreachable endpoint shows up as an error from the first call a task
    /// makes, so tasks that never use the chain still run.
    pub fn new(
        rpc_url: &str,
        chain_id: u64,
        private_key: &str,
        gas: GasPricing,
    ) -> Result<Self, ChainError> {
        let rpc_url: Url = rpc_url
            .parse()
            .map_err(|e| ChainError::Config(format!("invalid rpc url {rpc_url}: {e}")))?;
        let wallet = KeeperWallet::from_key(private_key, chain_id, gas)?;
        info!(chain_id, rpc = %rpc_url, signer = %wallet.address(), gas = wallet.pricing().model(), "Chain client configured");

        Ok(Self {
            rpc_url,
            chain_id,
            wallet,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    fn signer_address(&self) -> Address {
        self.wallet.address()
    }

    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        Ok(provider.get_block_number().await?)
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let block = provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await?
            .ok_or(ChainError::BlockNotFound(number))?;
        Ok(block.header.timestamp)
    }

    #[instrument(skip(self, query), fields(from = query.from_block, to = query.to_block))]
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ChainError> {
        let filter = Filter::new()
            .address(query.addresses.clone())
            .event_signature(query.topics.clone())
            .from_block(query.from_block)
            .to_block(query.to_block);

        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let logs = provider.get_logs(&filter).await?;

        let mut logs: Vec<ChainLog> = logs
            .into_iter()
            .map(|log| ChainLog {
                address: log.address(),
                block_number: log.block_number.unwrap_or_default(),
                log_index: log.log_index.unwrap_or_default(),
                data: log.inner.data,
            })
            .collect();
        logs.sort_by_key(|log| (log.block_number, log.log_index));

        debug!(count = logs.len(), "Fetched logs");
        Ok(logs)
    }

    async fn read(
        &self,
        to: Address,
        call: &CallSpec,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ChainError> {
        let input = call.encode(args)?;
        let tx = TransactionRequest::default()
            .with_from(self.wallet.address())
            .with_to(to)
            .with_input(input);

        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let output = provider.call(tx).await?;
        call.decode_output(&output)
    }

    async fn write(
        &self,
        to: Address,
        call: &CallSpec,
        args: &[DynSolValue],
        options: WriteOptions,
    ) -> Result<B256, ChainError> {
        let input = call.encode(args)?;
        debug!(to = %to, function = call.name(), "Submitting call");
        self.wallet.send(&self.rpc_url, to, input, options).await
    }
}
