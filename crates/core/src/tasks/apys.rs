//! Strategy APY and TVL snapshots from the Rodeo API.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, instrument, warn};

use keeper_api::{ApyClient, ApyQuote};
use keeper_store::{ApySnapshot, IdGenerator, Store};

use crate::clock::Clock;
use crate::config::StrategyEntry;
use crate::scheduler::TaskBody;

/// Anything that can quote a strategy's APY.
#[async_trait]
pub trait ApyFeed: Send + Sync {
    async fn quote(&self, source: &str, id: &str) -> Result<ApyQuote>;
}

#[async_trait]
impl ApyFeed for ApyClient {
    async fn quote(&self, source: &str, id: &str) -> Result<ApyQuote> {
        self.fetch(source, id).await
    }
}

pub struct ApySnapshotTask {
    pub(crate) feed: Arc<dyn ApyFeed>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) ids: Arc<IdGenerator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) chain_id: u64,
    pub(crate) strategies: Vec<StrategyEntry>,
}

#[async_trait]
impl TaskBody for ApySnapshotTask {
    /// Quote failures skip the strategy; store failures fail the task.
    #[instrument(skip(self), name = "apys")]
    async fn run(&self) -> Result<()> {
        let mut stored = 0;
        for strategy in &self.strategies {
            let quote = match self.feed.quote(&strategy.apy.kind, &strategy.apy.id).await {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(
                        strategy = %strategy.address,
                        source = %strategy.apy.kind,
                        error = %format!("{e:#}"),
                        "Failed to fetch APY"
                    );
                    continue;
                }
            };

            self.store
                .insert_apy_snapshot(&ApySnapshot {
                    id: self.ids.next_id(),
                    chain: self.chain_id,
                    address: strategy.address,
                    time: self.clock.now(),
                    apy: quote.apy,
                    tvl: quote.tvl,
                })
                .await?;
            stored += 1;
        }

        info!(stored, strategies = self.strategies.len(), "APY snapshots stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ApySource;
    use alloy::primitives::Address;
    use chrono::{TimeZone, Utc};
    use keeper_store::MemoryStore;

    struct FakeFeed;

    #[async_trait]
    impl ApyFeed for FakeFeed {
        async fn quote(&self, source: &str, id: &str) -> Result<ApyQuote> {
            match id {
                "down" => anyhow::bail!("GET {source}?id={id} returned 502"),
                _ => Ok(ApyQuote { apy: 0.125, tvl: 1_000_000.0 }),
            }
        }
    }

    fn strategy(byte: u8, id: &str) -> StrategyEntry {
        StrategyEntry {
            address: Address::repeat_byte(byte),
            label: None,
            apy: ApySource {
                kind: "defillama".to_string(),
                id: id.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_failed_quote_skips_strategy() {
        let store = Arc::new(MemoryStore::new());
        let task = ApySnapshotTask {
            feed: Arc::new(FakeFeed),
            store: store.clone(),
            ids: Arc::new(IdGenerator::new()),
            clock: Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap())),
            chain_id: 42161,
            strategies: vec![strategy(1, "a"), strategy(2, "down"), strategy(3, "c")],
        };

        task.run().await.unwrap();

        let rows = store.apy_snapshots();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address, Address::repeat_byte(1));
        assert_eq!(rows[1].address, Address::repeat_byte(3));
        assert_eq!(rows[1].apy, 0.125);
    }
}
