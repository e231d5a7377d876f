//! Pushes price updates to keeper-driven oracles that have gone stale.

use std::sync::Arc;

use alloy::primitives::U256;
use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use keeper_chain::call::expect_uint;
use keeper_chain::contracts::oracle;
use keeper_chain::{ChainClient, WriteOptions};

use crate::clock::Clock;
use crate::config::OracleEntry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OracleReport {
    pub fresh: usize,
    pub updated: usize,
    pub failed: usize,
}

pub struct OracleRefresher {
    chain: Arc<dyn ChainClient>,
    clock: Arc<dyn Clock>,
    oracles: Vec<OracleEntry>,
    staleness_secs: u64,
}

impl OracleRefresher {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        clock: Arc<dyn Clock>,
        oracles: Vec<OracleEntry>,
        staleness_secs: u64,
    ) -> Self {
        Self {
            chain,
            clock,
            oracles,
            staleness_secs,
        }
    }

    /// Check every oracle once; failures only affect the oracle at hand.
    #[instrument(skip(self), fields(oracles = self.oracles.len()))]
    pub async fn refresh(&self) -> OracleReport {
        let mut report = OracleReport::default();
        for entry in &self.oracles {
            match self.refresh_one(entry).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.fresh += 1,
                Err(e) => {
                    warn!(oracle = ?entry.label, address = %entry.address, error = %format!("{e:#}"), "Oracle refresh failed");
                    report.failed += 1;
                }
            }
        }
        info!(updated = report.updated, fresh = report.fresh, failed = report.failed, "Oracles checked");
        report
    }

    async fn refresh_one(&self, entry: &OracleEntry) -> Result<bool> {
        let call = oracle::last_timestamp();
        let values = self.chain.read(entry.address, &call, &[]).await?;
        let last = expect_uint(&values, 0, call.name())?;

        let now = U256::from(self.clock.now().timestamp().max(0) as u64);
        let deadline = last.saturating_add(U256::from(self.staleness_secs));
        if now <= deadline {
            debug!(oracle = ?entry.label, %last, "Oracle fresh");
            return Ok(false);
        }

        let tx = self
            .chain
            .write(entry.address, &oracle::update(), &[], WriteOptions::mined())
            .await?;
        info!(oracle = ?entry.label, %last, tx = %tx, "Oracle updated");
        Ok(true)
    }
}
