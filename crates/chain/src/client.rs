//! The chain access seam used by every keeper task.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, LogData, B256};
use async_trait::async_trait;

use crate::call::CallSpec;
use crate::error::ChainError;

/// Log filter over an inclusive block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub addresses: Vec<Address>,
    /// Accepted topic0 values (OR-ed)
    pub topics: Vec<B256>,
    pub from_block: u64,
    pub to_block: u64,
}

/// A raw log with its position in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
    pub address: Address,
    pub block_number: u64,
    pub log_index: u64,
    pub data: LogData,
}

/// How long `write` waits before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Return once the node accepted the transaction
    Submitted,
    /// Wait for the receipt; a failed status becomes [`ChainError::Reverted`]
    Mined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Explicit gas limit; estimated by the node when absent
    pub gas_limit: Option<u64>,
    pub confirmation: Confirmation,
}

impl WriteOptions {
    pub fn mined() -> Self {
        Self {
            gas_limit: None,
            confirmation: Confirmation::Mined,
        }
    }

    pub fn submitted_with_gas(gas_limit: u64) -> Self {
        Self {
            gas_limit: Some(gas_limit),
            confirmation: Confirmation::Submitted,
        }
    }
}

/// Typed read/write access to ledger contracts.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address transactions are signed with.
    fn signer_address(&self) -> Address;

    async fn latest_block_number(&self) -> Result<u64, ChainError>;

    /// Unix timestamp (seconds) of a block.
    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError>;

    /// Logs matching `query`, ascending by block then log index.
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<ChainLog>, ChainError>;

    /// `eth_call` a view function and decode its return values.
    async fn read(
        &self,
        to: Address,
        call: &CallSpec,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ChainError>;

    /// Sign and send a state-changing call, returning the transaction hash.
    async fn write(
        &self,
        to: Address,
        call: &CallSpec,
        args: &[DynSolValue],
        options: WriteOptions,
    ) -> Result<B256, ChainError>;
}
