//! Submits `killBatched` transactions for at-risk positions.

use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use tracing::{error, info, instrument};

use keeper_chain::contracts::{helper, kill_batched_args};
use keeper_chain::{ChainClient, WriteOptions};

use crate::risk::RemediationCandidate;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiquidationReport {
    pub submitted: Vec<B256>,
    pub failed: usize,
}

/// Liquidates candidates in fixed-size batches.
///
/// Proceeds go to the signer. A batch counts as done once the node accepts
/// it; receipts are not awaited.
pub struct LiquidationExecutor {
    chain: Arc<dyn ChainClient>,
    helper: Address,
    batch_size: usize,
    gas_limit: u64,
}

impl LiquidationExecutor {
    pub fn new(chain: Arc<dyn ChainClient>, helper: Address, batch_size: usize, gas_limit: u64) -> Self {
        Self {
            chain,
            helper,
            batch_size: batch_size.max(1),
            gas_limit,
        }
    }

    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn execute(&self, candidates: &[RemediationCandidate]) -> LiquidationReport {
        let call = helper::kill_batched();
        let to = self.chain.signer_address();
        let mut report = LiquidationReport::default();

        for batch in candidates.chunks(self.batch_size) {
            let ids: Vec<U256> = batch.iter().map(|c| U256::from(c.index)).collect();
            let args = kill_batched_args(&ids, to);

            match self
                .chain
                .write(self.helper, &call, &args, WriteOptions::submitted_with_gas(self.gas_limit))
                .await
            {
                Ok(hash) => {
                    info!(positions = ?ids, tx = %hash, "Liquidation submitted");
                    report.submitted.push(hash);
                }
                Err(e) => {
                    error!(positions = ?ids, error = %e, revert = ?e.revert_data(), "Liquidation batch failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChain;
    use alloy::dyn_abi::DynSolValue;
    use keeper_chain::Confirmation;

    const HELPER: Address = Address::repeat_byte(0x12);

    fn candidates(n: u64) -> Vec<RemediationCandidate> {
        (0..n)
            .map(|index| RemediationCandidate {
                index,
                life: U256::from(1u64),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_batches_continue_after_failure() {
        let chain = Arc::new(FakeChain::new());
        chain.fail_write(0);
        let executor = LiquidationExecutor::new(chain.clone(), HELPER, 5, 10_000_000);

        let report = executor.execute(&candidates(12)).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.submitted.len(), 2);

        let writes = chain.writes();
        let sizes: Vec<_> = writes.iter().map(|w| w.uint_array_arg().len()).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(writes[2].uint_array_arg(), vec![U256::from(10u64), U256::from(11u64)]);
    }

    #[tokio::test]
    async fn test_kill_call_shape() {
        let chain = Arc::new(FakeChain::new());
        let executor = LiquidationExecutor::new(chain.clone(), HELPER, 5, 10_000_000);
        executor.execute(&candidates(2)).await;

        let write = &chain.writes()[0];
        assert_eq!(write.to, HELPER);
        assert_eq!(write.function, "killBatched");
        assert_eq!(write.args[1], DynSolValue::Array(vec![DynSolValue::Bytes(vec![]); 2]));
        assert_eq!(write.args[2], DynSolValue::Address(chain.signer_address()));

        let options = write.options.unwrap();
        assert_eq!(options.gas_limit, Some(10_000_000));
        assert_eq!(options.confirmation, Confirmation::Submitted);
    }

    #[tokio::test]
    async fn test_nothing_to_liquidate() {
        let chain = Arc::new(FakeChain::new());
        let report = LiquidationExecutor::new(chain.clone(), HELPER, 5, 1).execute(&[]).await;
        assert_eq!(report, LiquidationReport::default());
        assert!(chain.writes().is_empty());
    }
}
