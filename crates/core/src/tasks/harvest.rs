//! Calls `earn()` on every strategy so rewards get compounded.

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, instrument};

use keeper_chain::contracts::strategy;
use keeper_chain::{ChainClient, WriteOptions};

use crate::scheduler::TaskBody;

pub struct HarvestTask {
    pub(crate) chain: Arc<dyn ChainClient>,
    pub(crate) strategies: Vec<Address>,
}

#[async_trait]
impl TaskBody for HarvestTask {
    #[instrument(skip(self), name = "strategies")]
    async fn run(&self) -> Result<()> {
        let call = strategy::earn();
        let mut harvested = 0;
        for &address in &self.strategies {
            info!(strategy = %address, "Harvesting");
            match self.chain.write(address, &call, &[], WriteOptions::mined()).await {
                Ok(tx) => {
                    info!(strategy = %address, tx = %tx, "Harvest confirmed");
                    harvested += 1;
                }
                Err(e) => error!(strategy = %address, error = %e, "Harvest failed"),
            }
        }
        info!(harvested, strategies = self.strategies.len(), "Harvest complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChain;

    #[tokio::test]
    async fn test_failure_does_not_stop_harvest() {
        let chain = Arc::new(FakeChain::new());
        let strategies: Vec<_> = (1..=3).map(Address::repeat_byte).collect();
        chain.fail_writes_to(strategies[0]);

        HarvestTask {
            chain: chain.clone(),
            strategies: strategies.clone(),
        }
        .run()
        .await
        .unwrap();

        let writes = chain.writes();
        assert_eq!(writes.iter().map(|w| w.to).collect::<Vec<_>>(), strategies);
        assert!(writes.iter().all(|w| w.function == "earn"));
    }
}
