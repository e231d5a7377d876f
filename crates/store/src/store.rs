use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{
    ApySnapshot, EventStream, NewPosition, PoolSnapshot, PositionEvent, PositionRow,
    PositionSnapshot, PositionValues, StrategyProfit, TaskRun, TaskSchedule,
};

/// Durable storage for schedules, run logs and the chain mirror.
///
/// One method per statement the keeper issues. Ids are assigned by the caller.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load_schedules(&self) -> Result<Vec<TaskSchedule>, StoreError>;

    /// Insert or overwrite the schedule row for `schedule.id`.
    async fn upsert_schedule(&self, schedule: &TaskSchedule) -> Result<(), StoreError>;

    async fn insert_task_run(&self, run: &TaskRun) -> Result<(), StoreError>;

    /// Highest block ingested for a stream on a chain.
    async fn latest_block(&self, stream: EventStream, chain: u64) -> Result<Option<u64>, StoreError>;

    async fn insert_position_event(&self, event: &PositionEvent) -> Result<(), StoreError>;

    /// Mirrored positions for a chain ordered by index.
    async fn list_positions(&self, chain: u64) -> Result<Vec<PositionRow>, StoreError>;

    async fn insert_position(&self, position: &NewPosition) -> Result<(), StoreError>;

    async fn update_position(
        &self,
        id: i64,
        values: &PositionValues,
        updated: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn insert_position_snapshot(&self, snapshot: &PositionSnapshot) -> Result<(), StoreError>;

    async fn insert_pool_snapshot(&self, snapshot: &PoolSnapshot) -> Result<(), StoreError>;

    async fn insert_apy_snapshot(&self, snapshot: &ApySnapshot) -> Result<(), StoreError>;

    async fn insert_strategy_profit(&self, profit: &StrategyProfit) -> Result<(), StoreError>;
}
