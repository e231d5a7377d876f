//! Rodeo keeper core logic.
//!
//! This crate provides the batch keeper's behaviour on top of the chain,
//! store and api crates:
//! - Interval scheduler with boundary-aligned run records
//! - Event stream synchronizers with derived cursors
//! - Position mirror, risk scanner and batched liquidations
//! - Oracle refresh, strategy harvest, pool and APY snapshots
//! - Chat alerts for position changes and strategy profits

mod alerts;
pub mod clock;
pub mod config;
mod cursor;
pub mod format;
mod liquidator;
mod mirror;
mod notify;
mod oracle;
mod risk;
mod scheduler;
mod sync;
pub mod tasks;
pub mod u256_math;

#[cfg(test)]
mod testing;

pub use alerts::{format_earn_alert, format_position_alert, AlertDispatcher};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ChainCatalog, ConfigError, KeeperConfig, KeeperSettings};
pub use cursor::CursorTracker;
pub use liquidator::{LiquidationExecutor, LiquidationReport};
pub use mirror::{MirrorReport, PositionIndex, PositionMirror};
pub use notify::{LogNotifier, Notifier, TelegramNotifier};
pub use oracle::{OracleRefresher, OracleReport};
pub use risk::{RemediationCandidate, RiskScanner};
pub use scheduler::{RunSummary, TaskBody, TaskDefinition, TaskOutcome, TaskScheduler};
pub use sync::{
    EarnIngestor, EventSynchronizer, IngestedEarn, IngestedPositionEvent, LogIngestor,
    PositionEventIngestor, SyncOutcome,
};
pub use tasks::{build_tasks, KeeperContext, DEFAULT_INTERVALS};
