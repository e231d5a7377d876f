//! Row types written and read by the keeper.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};

/// Append-only event streams whose cursor is derived from stored rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStream {
    /// Investor `Edit` / `Kill` events
    PositionEvents,
    /// Strategy `Earn` events
    StrategyProfits,
}

impl EventStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStream::PositionEvents => "positions_events",
            EventStream::StrategyProfits => "strategies_profits",
        }
    }
}

impl std::fmt::Display for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last boundary a task was scheduled at (`tasks_schedules`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSchedule {
    pub id: String,
    pub time: DateTime<Utc>,
}

/// One execution attempt (`tasks`). `error` is empty on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRun {
    pub id: i64,
    pub task: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionEvent {
    pub id: i64,
    pub chain: u64,
    pub index: U256,
    pub block: u64,
    pub name: String,
    pub data: BTreeMap<String, String>,
}

/// The slice of a mirrored position the scanners need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRow {
    pub id: i64,
    pub index: u64,
    pub shares: U256,
}

/// Value columns shared by `positions` and `positions_history`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionValues {
    pub shares: U256,
    pub borrow: U256,
    pub shares_value: U256,
    pub borrow_value: U256,
    pub life: U256,
    pub amount: U256,
    pub price: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPosition {
    pub id: i64,
    pub chain: u64,
    pub index: u64,
    pub pool: Address,
    pub strategy: U256,
    pub values: PositionValues,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSnapshot {
    pub id: i64,
    pub chain: u64,
    pub index: u64,
    pub values: PositionValues,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub id: i64,
    pub chain: u64,
    pub address: Address,
    pub time: DateTime<Utc>,
    pub index: U256,
    pub share: U256,
    pub supply: U256,
    pub borrow: U256,
    pub rate: U256,
    pub price: U256,
}

/// APY and TVL as reported by the off-chain API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApySnapshot {
    pub id: i64,
    pub chain: u64,
    pub address: Address,
    pub time: DateTime<Utc>,
    pub apy: f64,
    pub tvl: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyProfit {
    pub id: i64,
    pub chain: u64,
    pub block: u64,
    /// Block time of the `Earn` event
    pub time: DateTime<Utc>,
    pub strategy: Address,
    pub earn: U256,
    pub tvl: U256,
}
