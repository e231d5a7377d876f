//! Finds positions whose health ratio fell below the liquidation threshold.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use keeper_chain::call::expect_uint_array;
use keeper_chain::contracts::{helper, uint_array_arg};
use keeper_chain::ChainClient;
use keeper_store::Store;

use crate::mirror::PositionIndex;
use crate::u256_math::is_at_risk;

/// A position eligible for liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemediationCandidate {
    pub index: u64,
    /// Health ratio at scan time, 1e18 scale
    pub life: U256,
}

pub struct RiskScanner {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn Store>,
    chain_id: u64,
    investor: Address,
    helper: Address,
    batch_size: usize,
}

impl RiskScanner {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn Store>,
        chain_id: u64,
        investor: Address,
        helper: Address,
        batch_size: usize,
    ) -> Self {
        Self {
            chain,
            store,
            chain_id,
            investor,
            helper,
            batch_size: batch_size.max(1),
        }
    }

    /// Read health ratios in batches and keep the at-risk positions, in
    /// index order. Nothing is submitted.
    #[instrument(skip(self), fields(chain = self.chain_id))]
    pub async fn find_undercollateralized(&self) -> Result<Vec<RemediationCandidate>> {
        let index =
            PositionIndex::load(self.chain.as_ref(), self.store.as_ref(), self.chain_id, self.investor).await?;
        let live: Vec<u64> = index.live().collect();
        let call = helper::life_batched();

        let mut candidates = Vec::new();
        for batch in live.chunks(self.batch_size) {
            let ids: Vec<U256> = batch.iter().map(|&i| U256::from(i)).collect();
            let values = self
                .chain
                .read(self.helper, &call, &[uint_array_arg(ids)])
                .await
                .with_context(|| format!("failed to read health of positions {}..={}", batch[0], batch[batch.len() - 1]))?;
            let lives = expect_uint_array(&values, 0, call.name())?;
            if lives.len() != batch.len() {
                anyhow::bail!(
                    "lifeBatched returned {} values for {} positions",
                    lives.len(),
                    batch.len()
                );
            }

            for (&position, life) in batch.iter().zip(lives) {
                if is_at_risk(life) {
                    debug!(position, %life, "Position at risk");
                    candidates.push(RemediationCandidate { index: position, life });
                }
            }
        }

        info!(scanned = live.len(), at_risk = candidates.len(), "Risk scan complete");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::tests::{mirrored, HELPER, INVESTOR};
    use crate::testing::{uint_return, FakeChain};
    use crate::u256_math::WAD;
    use alloy::dyn_abi::DynSolValue;
    use keeper_store::MemoryStore;

    fn scanner(chain: &Arc<FakeChain>, store: &Arc<MemoryStore>, batch: usize) -> RiskScanner {
        RiskScanner::new(chain.clone(), store.clone(), 1337, INVESTOR, HELPER, batch)
    }

    /// Answers `lifeBatched` from a per-index table.
    fn lives(chain: &FakeChain, table: Vec<U256>) {
        chain.on_read(HELPER, "lifeBatched", move |args| {
            let ids = args[0].as_array().map(<[_]>::to_vec).unwrap_or_default();
            Ok(vec![DynSolValue::Array(
                ids.iter()
                    .map(|id| {
                        let i = id.as_uint().unwrap().0.to::<usize>();
                        DynSolValue::Uint(table[i], 256)
                    })
                    .collect(),
            )])
        });
    }

    #[tokio::test]
    async fn test_unmirrored_positions_are_evaluated() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(MemoryStore::new());
        chain.on_read(INVESTOR, "nextPosition", |_| Ok(uint_return(3)));
        lives(&chain, vec![WAD * U256::from(2u64); 3]);
        mirrored(&store, 0, 5).await;
        mirrored(&store, 2, 5).await;

        let candidates = scanner(&chain, &store, 100).find_undercollateralized().await.unwrap();
        assert!(candidates.is_empty());

        let calls = chain.reads_of("lifeBatched");
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].uint_array_arg(),
            vec![U256::from(0u64), U256::from(1u64), U256::from(2u64)]
        );
    }

    #[tokio::test]
    async fn test_threshold_and_closed_positions() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(MemoryStore::new());
        chain.on_read(INVESTOR, "nextPosition", |_| Ok(uint_return(5)));
        lives(
            &chain,
            vec![
                U256::ZERO,                     // unpriced
                WAD - U256::from(1u64),         // at risk
                WAD,                            // exactly at threshold
                U256::from(900_000_000_000_000_000u64), // closed below
                U256::from(1u64),               // at risk
            ],
        );
        mirrored(&store, 3, 0).await;

        let candidates = scanner(&chain, &store, 100).find_undercollateralized().await.unwrap();
        assert_eq!(
            candidates,
            vec![
                RemediationCandidate { index: 1, life: WAD - U256::from(1u64) },
                RemediationCandidate { index: 4, life: U256::from(1u64) },
            ]
        );
    }

    #[tokio::test]
    async fn test_batches_reads() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(MemoryStore::new());
        chain.on_read(INVESTOR, "nextPosition", |_| Ok(uint_return(7)));
        lives(&chain, vec![U256::from(5u64); 7]);

        let candidates = scanner(&chain, &store, 3).find_undercollateralized().await.unwrap();
        assert_eq!(candidates.len(), 7);
        let sizes: Vec<_> = chain
            .reads_of("lifeBatched")
            .iter()
            .map(|c| c.uint_array_arg().len())
            .collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_no_positions_no_reads() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(MemoryStore::new());
        chain.on_read(INVESTOR, "nextPosition", |_| Ok(uint_return(0)));

        assert!(scanner(&chain, &store, 100).find_undercollateralized().await.unwrap().is_empty());
        assert!(chain.reads_of("lifeBatched").is_empty());
    }
}
