//! In-process [`Store`] used by tests and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use alloy::primitives::{Address, U256};

use crate::error::StoreError;
use crate::model::{
    ApySnapshot, EventStream, NewPosition, PoolSnapshot, PositionEvent, PositionRow,
    PositionSnapshot, PositionValues, StrategyProfit, TaskRun, TaskSchedule,
};
use crate::store::Store;

/// A mirrored position as held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPosition {
    pub id: i64,
    pub chain: u64,
    pub index: u64,
    pub pool: Address,
    pub strategy: U256,
    pub values: PositionValues,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    schedules: Vec<TaskSchedule>,
    task_runs: Vec<TaskRun>,
    position_events: Vec<PositionEvent>,
    positions: Vec<StoredPosition>,
    position_snapshots: Vec<PositionSnapshot>,
    pool_snapshots: Vec<PoolSnapshot>,
    apy_snapshots: Vec<ApySnapshot>,
    strategy_profits: Vec<StrategyProfit>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: Mutex<Option<String>>,
    event_insert_budget: Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StoreError::Unavailable`] until cleared.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.lock() = reason.map(str::to_string);
    }

    /// Accept `n` more position events, then fail the rest.
    pub fn fail_position_events_after(&self, n: usize) {
        *self.event_insert_budget.lock() = Some(n);
    }

    fn check(&self) -> Result<(), StoreError> {
        match self.unavailable.lock().as_ref() {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    pub fn schedules(&self) -> Vec<TaskSchedule> {
        self.tables.lock().schedules.clone()
    }

    pub fn task_runs(&self) -> Vec<TaskRun> {
        self.tables.lock().task_runs.clone()
    }

    pub fn position_events(&self) -> Vec<PositionEvent> {
        self.tables.lock().position_events.clone()
    }

    pub fn positions(&self) -> Vec<StoredPosition> {
        self.tables.lock().positions.clone()
    }

    pub fn position_snapshots(&self) -> Vec<PositionSnapshot> {
        self.tables.lock().position_snapshots.clone()
    }

    pub fn pool_snapshots(&self) -> Vec<PoolSnapshot> {
        self.tables.lock().pool_snapshots.clone()
    }

    pub fn apy_snapshots(&self) -> Vec<ApySnapshot> {
        self.tables.lock().apy_snapshots.clone()
    }

    pub fn strategy_profits(&self) -> Vec<StrategyProfit> {
        self.tables.lock().strategy_profits.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_schedules(&self) -> Result<Vec<TaskSchedule>, StoreError> {
        self.check()?;
        Ok(self.schedules())
    }

    async fn upsert_schedule(&self, schedule: &TaskSchedule) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.lock();
        match tables.schedules.iter_mut().find(|s| s.id == schedule.id) {
            Some(existing) => existing.time = schedule.time,
            None => tables.schedules.push(schedule.clone()),
        }
        Ok(())
    }

    async fn insert_task_run(&self, run: &TaskRun) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().task_runs.push(run.clone());
        Ok(())
    }

    async fn latest_block(&self, stream: EventStream, chain: u64) -> Result<Option<u64>, StoreError> {
        self.check()?;
        let tables = self.tables.lock();
        let latest = match stream {
            EventStream::PositionEvents => tables
                .position_events
                .iter()
                .filter(|e| e.chain == chain)
                .map(|e| e.block)
                .max(),
            EventStream::StrategyProfits => tables
                .strategy_profits
                .iter()
                .filter(|p| p.chain == chain)
                .map(|p| p.block)
                .max(),
        };
        Ok(latest)
    }

    async fn insert_position_event(&self, event: &PositionEvent) -> Result<(), StoreError> {
        self.check()?;
        if let Some(budget) = self.event_insert_budget.lock().as_mut() {
            if *budget == 0 {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            *budget -= 1;
        }
        self.tables.lock().position_events.push(event.clone());
        Ok(())
    }

    async fn list_positions(&self, chain: u64) -> Result<Vec<PositionRow>, StoreError> {
        self.check()?;
        let tables = self.tables.lock();
        let mut rows: Vec<PositionRow> = tables
            .positions
            .iter()
            .filter(|p| p.chain == chain)
            .map(|p| PositionRow {
                id: p.id,
                index: p.index,
                shares: p.values.shares,
            })
            .collect();
        rows.sort_by_key(|row| row.index);
        Ok(rows)
    }

    async fn insert_position(&self, position: &NewPosition) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.lock();
        if tables
            .positions
            .iter()
            .any(|p| p.chain == position.chain && p.index == position.index)
        {
            return Err(StoreError::Conflict(format!(
                "duplicate position {} on chain {}",
                position.index, position.chain
            )));
        }
        tables.positions.push(StoredPosition {
            id: position.id,
            chain: position.chain,
            index: position.index,
            pool: position.pool,
            strategy: position.strategy,
            values: position.values.clone(),
            created: position.created,
            updated: position.created,
        });
        Ok(())
    }

    async fn update_position(
        &self,
        id: i64,
        values: &PositionValues,
        updated: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.lock();
        if let Some(position) = tables.positions.iter_mut().find(|p| p.id == id) {
            position.values = values.clone();
            position.updated = updated;
        }
        Ok(())
    }

    async fn insert_position_snapshot(&self, snapshot: &PositionSnapshot) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().position_snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn insert_pool_snapshot(&self, snapshot: &PoolSnapshot) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().pool_snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn insert_apy_snapshot(&self, snapshot: &ApySnapshot) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().apy_snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn insert_strategy_profit(&self, profit: &StrategyProfit) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().strategy_profits.push(profit.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(chain: u64, block: u64) -> PositionEvent {
        PositionEvent {
            id: block as i64,
            chain,
            index: U256::from(1u64),
            block,
            name: "Edit".to_string(),
            data: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_latest_block_per_stream_and_chain() {
        let store = MemoryStore::new();
        assert_eq!(store.latest_block(EventStream::PositionEvents, 1).await.unwrap(), None);

        store.insert_position_event(&event(1, 10)).await.unwrap();
        store.insert_position_event(&event(1, 30)).await.unwrap();
        store.insert_position_event(&event(1, 20)).await.unwrap();
        store.insert_position_event(&event(2, 99)).await.unwrap();

        assert_eq!(
            store.latest_block(EventStream::PositionEvents, 1).await.unwrap(),
            Some(30)
        );
        assert_eq!(
            store.latest_block(EventStream::StrategyProfits, 1).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_upsert_schedule_overwrites() {
        let store = MemoryStore::new();
        let first = TaskSchedule {
            id: "pools".to_string(),
            time: DateTime::<Utc>::from_timestamp(3600, 0).unwrap(),
        };
        store.upsert_schedule(&first).await.unwrap();
        store
            .upsert_schedule(&TaskSchedule {
                time: DateTime::<Utc>::from_timestamp(7200, 0).unwrap(),
                ..first.clone()
            })
            .await
            .unwrap();

        let schedules = store.load_schedules().await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].time.timestamp(), 7200);
    }

    #[tokio::test]
    async fn test_positions_sorted_and_unique() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (id, index) in [(1, 5u64), (2, 2), (3, 9)] {
            store
                .insert_position(&NewPosition {
                    id,
                    chain: 1337,
                    index,
                    pool: Address::ZERO,
                    strategy: U256::ZERO,
                    values: PositionValues::default(),
                    created: now,
                })
                .await
                .unwrap();
        }

        let indexes: Vec<u64> = store
            .list_positions(1337)
            .await
            .unwrap()
            .iter()
            .map(|p| p.index)
            .collect();
        assert_eq!(indexes, vec![2, 5, 9]);

        let duplicate = NewPosition {
            id: 4,
            chain: 1337,
            index: 5,
            pool: Address::ZERO,
            strategy: U256::ZERO,
            values: PositionValues::default(),
            created: now,
        };
        assert!(matches!(
            store.insert_position(&duplicate).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(Some("connection refused"));
        assert!(matches!(
            store.load_schedules().await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(None);
        assert!(store.load_schedules().await.is_ok());
    }
}
