//! Periodic lending pool snapshots.

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, instrument};

use keeper_chain::contracts::{address_array_arg, helper};
use keeper_chain::{ChainClient, PoolView};
use keeper_store::{IdGenerator, PoolSnapshot, Store};

use crate::clock::Clock;
use crate::scheduler::TaskBody;

/// Reads `peekPools` for the chain's pools and appends one history row each.
pub struct PoolSnapshotTask {
    pub(crate) chain: Arc<dyn ChainClient>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) ids: Arc<IdGenerator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) chain_id: u64,
    pub(crate) helper: Address,
    pub(crate) pools: Vec<Address>,
}

#[async_trait]
impl TaskBody for PoolSnapshotTask {
    #[instrument(skip(self), name = "pools")]
    async fn run(&self) -> Result<()> {
        if self.pools.is_empty() {
            info!("No pools configured");
            return Ok(());
        }

        let values = self
            .chain
            .read(self.helper, &helper::peek_pools(), &[address_array_arg(&self.pools)])
            .await
            .context("failed to read peekPools")?;
        let rows = PoolView::from_values(&self.pools, &values)?;
        let time = self.clock.now();

        for pool in &rows {
            self.store
                .insert_pool_snapshot(&PoolSnapshot {
                    id: self.ids.next_id(),
                    chain: self.chain_id,
                    address: pool.address,
                    time,
                    index: pool.index,
                    share: pool.share,
                    supply: pool.supply,
                    borrow: pool.borrow,
                    rate: pool.rate,
                    price: pool.price,
                })
                .await
                .with_context(|| format!("failed to store snapshot of pool {}", pool.address))?;
        }

        info!(pools = rows.len(), "Pool snapshots stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::FakeChain;
    use alloy::primitives::U256;
    use chrono::{TimeZone, Utc};
    use keeper_chain::contracts::uint_array_arg;
    use keeper_store::MemoryStore;

    const HELPER: Address = Address::repeat_byte(0x12);

    fn task(chain: &Arc<FakeChain>, store: &Arc<MemoryStore>, pools: Vec<Address>) -> PoolSnapshotTask {
        PoolSnapshotTask {
            chain: chain.clone(),
            store: store.clone(),
            ids: Arc::new(IdGenerator::new()),
            clock: Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap())),
            chain_id: 42161,
            helper: HELPER,
            pools,
        }
    }

    #[tokio::test]
    async fn test_one_row_per_pool() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(MemoryStore::new());
        let pools = vec![Address::repeat_byte(1), Address::repeat_byte(2)];
        chain.on_read(HELPER, "peekPools", |_| {
            Ok((0..6u64)
                .map(|c| uint_array_arg([U256::from(c), U256::from(c + 100)]))
                .collect())
        });

        task(&chain, &store, pools.clone()).run().await.unwrap();

        let rows = store.pool_snapshots();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].address, pools[1]);
        assert_eq!(rows[1].index, U256::from(100u64));
        assert_eq!(rows[1].rate, U256::from(104u64));
        assert_eq!(rows[0].price, U256::from(5u64));
        assert_eq!(rows[0].chain, 42161);
        assert_eq!(rows[0].time.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_read_failure_fails_task() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(MemoryStore::new());
        let result = task(&chain, &store, vec![Address::repeat_byte(1)]).run().await;
        assert!(result.is_err());
        assert!(store.pool_snapshots().is_empty());
    }
}
