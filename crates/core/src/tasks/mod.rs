//! The keeper's task registry.
//!
//! | task                 | every  | does                                        |
//! |----------------------|--------|---------------------------------------------|
//! | `pools`              | 1h     | pool snapshots                              |
//! | `apys`               | 1h     | strategy APY/TVL snapshots                  |
//! | `positions`          | 1h     | position mirror and history                 |
//! | `events`             | 15m    | investor events and alerts                  |
//! | `strategies_profits` | 2h     | strategy earn events and alerts             |
//! | `strategies`         | 8h     | harvest every strategy                      |
//! | `liquidations`       | 5m     | liquidate unhealthy positions               |
//! | `oracles`            | 5m     | refresh stale oracles                       |

mod apys;
mod harvest;
mod pools;

pub use apys::{ApyFeed, ApySnapshotTask};
pub use harvest::HarvestTask;
pub use pools::PoolSnapshotTask;

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use keeper_chain::ChainClient;
use keeper_store::{IdGenerator, Store};

use crate::alerts::AlertDispatcher;
use crate::clock::Clock;
use crate::config::{ChainCatalog, KeeperSettings};
use crate::cursor::CursorTracker;
use crate::liquidator::LiquidationExecutor;
use crate::mirror::PositionMirror;
use crate::notify::Notifier;
use crate::oracle::OracleRefresher;
use crate::risk::RiskScanner;
use crate::scheduler::{TaskBody, TaskDefinition};
use crate::sync::{EarnIngestor, EventSynchronizer, PositionEventIngestor};

/// Built-in tasks and their default intervals in minutes, in run order.
pub const DEFAULT_INTERVALS: [(&str, u32); 8] = [
    ("pools", 60),
    ("apys", 60),
    ("positions", 60),
    ("events", 15),
    ("strategies_profits", 120),
    ("strategies", 480),
    ("liquidations", 5),
    ("oracles", 5),
];

/// Everything a task needs, shared by all of them.
pub struct KeeperContext {
    pub chain: Arc<dyn ChainClient>,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
    pub apy: Arc<dyn ApyFeed>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<IdGenerator>,
    pub catalog: ChainCatalog,
    pub settings: KeeperSettings,
    pub investor: Address,
    pub helper: Address,
}

impl KeeperContext {
    fn cursor(&self) -> CursorTracker {
        CursorTracker::new(self.store.clone(), self.catalog.chain_id, self.catalog.genesis_block)
    }

    fn dispatcher(&self) -> AlertDispatcher {
        AlertDispatcher::new(self.chain.clone(), self.helper, self.notifier.clone())
    }
}

/// Build the registry in run order with interval overrides applied.
pub fn build_tasks(ctx: &KeeperContext) -> Vec<TaskDefinition> {
    let chain_id = ctx.catalog.chain_id;
    let settings = &ctx.settings;

    DEFAULT_INTERVALS
        .iter()
        .filter_map(|&(id, default_minutes)| {
            let body: Arc<dyn TaskBody> = match id {
                "pools" => Arc::new(PoolSnapshotTask {
                    chain: ctx.chain.clone(),
                    store: ctx.store.clone(),
                    ids: ctx.ids.clone(),
                    clock: ctx.clock.clone(),
                    chain_id,
                    helper: ctx.helper,
                    pools: ctx.catalog.pools.clone(),
                }),
                "apys" => Arc::new(ApySnapshotTask {
                    feed: ctx.apy.clone(),
                    store: ctx.store.clone(),
                    ids: ctx.ids.clone(),
                    clock: ctx.clock.clone(),
                    chain_id,
                    strategies: ctx.catalog.strategies.clone(),
                }),
                "positions" => Arc::new(PositionsTask(PositionMirror::new(
                    ctx.chain.clone(),
                    ctx.store.clone(),
                    ctx.ids.clone(),
                    ctx.clock.clone(),
                    chain_id,
                    ctx.investor,
                    ctx.helper,
                ))),
                "events" => Arc::new(PositionEventsTask {
                    sync: EventSynchronizer::new(
                        ctx.chain.clone(),
                        ctx.cursor(),
                        PositionEventIngestor::new(ctx.store.clone(), ctx.ids.clone(), chain_id, ctx.investor),
                        settings.sync.batch_blocks,
                    ),
                    alerts: ctx.dispatcher(),
                }),
                "strategies_profits" => Arc::new(ProfitsTask {
                    sync: EventSynchronizer::new(
                        ctx.chain.clone(),
                        ctx.cursor(),
                        EarnIngestor::new(
                            ctx.chain.clone(),
                            ctx.store.clone(),
                            ctx.ids.clone(),
                            chain_id,
                            ctx.catalog.strategy_addresses(),
                        ),
                        settings.sync.batch_blocks,
                    ),
                    alerts: ctx.dispatcher(),
                }),
                "strategies" => Arc::new(HarvestTask {
                    chain: ctx.chain.clone(),
                    strategies: ctx.catalog.strategy_addresses(),
                }),
                "liquidations" => Arc::new(LiquidationsTask {
                    scanner: RiskScanner::new(
                        ctx.chain.clone(),
                        ctx.store.clone(),
                        chain_id,
                        ctx.investor,
                        ctx.helper,
                        settings.liquidation.read_batch_size,
                    ),
                    executor: LiquidationExecutor::new(
                        ctx.chain.clone(),
                        ctx.helper,
                        settings.liquidation.kill_batch_size,
                        settings.liquidation.kill_gas_limit,
                    ),
                }),
                "oracles" => Arc::new(OraclesTask(OracleRefresher::new(
                    ctx.chain.clone(),
                    ctx.clock.clone(),
                    ctx.catalog.oracles.clone(),
                    settings.oracles.staleness_secs,
                ))),
                _ => return None,
            };
            Some(TaskDefinition::new(id, settings.interval_for(id, default_minutes), body))
        })
        .collect()
}

struct PositionsTask(PositionMirror);

#[async_trait]
impl TaskBody for PositionsTask {
    async fn run(&self) -> Result<()> {
        self.0.run().await.map(|_| ())
    }
}

struct PositionEventsTask {
    sync: EventSynchronizer<PositionEventIngestor>,
    alerts: AlertDispatcher,
}

#[async_trait]
impl TaskBody for PositionEventsTask {
    async fn run(&self) -> Result<()> {
        let outcome = self.sync.sync().await;
        self.alerts.dispatch_position_events(&outcome.ingested).await;
        outcome.interrupted.map_or(Ok(()), Err)
    }
}

struct ProfitsTask {
    sync: EventSynchronizer<EarnIngestor>,
    alerts: AlertDispatcher,
}

#[async_trait]
impl TaskBody for ProfitsTask {
    async fn run(&self) -> Result<()> {
        let outcome = self.sync.sync().await;
        self.alerts.dispatch_earns(&outcome.ingested).await;
        outcome.interrupted.map_or(Ok(()), Err)
    }
}

struct LiquidationsTask {
    scanner: RiskScanner,
    executor: LiquidationExecutor,
}

#[async_trait]
impl TaskBody for LiquidationsTask {
    async fn run(&self) -> Result<()> {
        let candidates = self.scanner.find_undercollateralized().await?;
        if candidates.is_empty() {
            return Ok(());
        }
        let report = self.executor.execute(&candidates).await;
        info!(
            candidates = candidates.len(),
            submitted = report.submitted.len(),
            failed = report.failed,
            "Liquidation round complete"
        );
        Ok(())
    }
}

struct OraclesTask(OracleRefresher);

#[async_trait]
impl TaskBody for OraclesTask {
    async fn run(&self) -> Result<()> {
        self.0.refresh().await;
        Ok(())
    }
}
