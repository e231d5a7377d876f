//! Postgres-backed [`Store`].

use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::error::StoreError;
use crate::model::{
    ApySnapshot, EventStream, NewPosition, PoolSnapshot, PositionEvent, PositionRow,
    PositionSnapshot, PositionValues, StrategyProfit, TaskRun, TaskSchedule,
};
use crate::store::Store;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tasks_schedules (
        id TEXT PRIMARY KEY,
        time TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id BIGINT PRIMARY KEY,
        task TEXT NOT NULL,
        error TEXT NOT NULL DEFAULT '',
        time TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS positions_events (
        id BIGINT PRIMARY KEY,
        chain BIGINT NOT NULL,
        "index" NUMERIC NOT NULL,
        block BIGINT NOT NULL,
        name TEXT NOT NULL,
        data JSONB NOT NULL,
        time TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_positions_events_chain_block ON positions_events(chain, block DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS positions (
        id BIGINT PRIMARY KEY,
        chain BIGINT NOT NULL,
        "index" BIGINT NOT NULL,
        pool TEXT NOT NULL,
        strategy NUMERIC NOT NULL,
        shares NUMERIC NOT NULL,
        borrow NUMERIC NOT NULL,
        shares_value NUMERIC NOT NULL,
        borrow_value NUMERIC NOT NULL,
        life NUMERIC NOT NULL,
        amount NUMERIC NOT NULL,
        price NUMERIC NOT NULL,
        created TIMESTAMPTZ NOT NULL,
        updated TIMESTAMPTZ NOT NULL,
        UNIQUE (chain, "index")
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS positions_history (
        id BIGINT PRIMARY KEY,
        chain BIGINT NOT NULL,
        "index" BIGINT NOT NULL,
        shares NUMERIC NOT NULL,
        borrow NUMERIC NOT NULL,
        shares_value NUMERIC NOT NULL,
        borrow_value NUMERIC NOT NULL,
        life NUMERIC NOT NULL,
        amount NUMERIC NOT NULL,
        price NUMERIC NOT NULL,
        time TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pools_history (
        id BIGINT PRIMARY KEY,
        chain BIGINT NOT NULL,
        address TEXT NOT NULL,
        time TIMESTAMPTZ NOT NULL,
        "index" NUMERIC NOT NULL,
        share NUMERIC NOT NULL,
        supply NUMERIC NOT NULL,
        borrow NUMERIC NOT NULL,
        rate NUMERIC NOT NULL,
        price NUMERIC NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS apys_history (
        id BIGINT PRIMARY KEY,
        chain BIGINT NOT NULL,
        address TEXT NOT NULL,
        time TIMESTAMPTZ NOT NULL,
        apy DOUBLE PRECISION NOT NULL,
        tvl DOUBLE PRECISION NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS strategies_profits (
        id BIGINT PRIMARY KEY,
        chain BIGINT NOT NULL,
        block BIGINT NOT NULL,
        time TIMESTAMPTZ NOT NULL,
        strategy TEXT NOT NULL,
        earn NUMERIC NOT NULL,
        tvl NUMERIC NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_strategies_profits_chain_block ON strategies_profits(chain, block DESC)",
];

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create missing tables and indexes.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!(tables = 8, "Database schema ready");
        Ok(())
    }
}

fn chain_id(chain: u64) -> i64 {
    chain as i64
}

fn parse_u256(column: &'static str, value: String) -> Result<U256, StoreError> {
    // NUMERIC renders integral values without a fraction
    U256::from_str(value.trim()).map_err(|_| StoreError::InvalidValue { column, value })
}

#[async_trait]
impl Store for PgStore {
    async fn load_schedules(&self) -> Result<Vec<TaskSchedule>, StoreError> {
        let rows = sqlx::query("SELECT id, time FROM tasks_schedules")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<TaskSchedule, StoreError> {
                Ok(TaskSchedule {
                    id: row.try_get("id")?,
                    time: row.try_get("time")?,
                })
            })
            .collect()
    }

    async fn upsert_schedule(&self, schedule: &TaskSchedule) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tasks_schedules (id, time) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET time = EXCLUDED.time",
        )
        .bind(&schedule.id)
        .bind(schedule.time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_task_run(&self, run: &TaskRun) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO tasks (id, task, error) VALUES ($1, $2, $3)")
            .bind(run.id)
            .bind(&run.task)
            .bind(&run.error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn latest_block(&self, stream: EventStream, chain: u64) -> Result<Option<u64>, StoreError> {
        let sql = match stream {
            EventStream::PositionEvents => "SELECT MAX(block) FROM positions_events WHERE chain = $1",
            EventStream::StrategyProfits => {
                "SELECT MAX(block) FROM strategies_profits WHERE chain = $1"
            }
        };
        let block: Option<i64> = sqlx::query_scalar(sql)
            .bind(chain_id(chain))
            .fetch_one(&self.pool)
            .await?;
        Ok(block.map(|b| b as u64))
    }

    async fn insert_position_event(&self, event: &PositionEvent) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO positions_events (id, chain, "index", block, name, data)
               VALUES ($1, $2, $3::numeric, $4, $5, $6)"#,
        )
        .bind(event.id)
        .bind(chain_id(event.chain))
        .bind(event.index.to_string())
        .bind(event.block as i64)
        .bind(&event.name)
        .bind(Json(&event.data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_positions(&self, chain: u64) -> Result<Vec<PositionRow>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, "index", shares::text AS shares FROM positions
               WHERE chain = $1 ORDER BY "index""#,
        )
        .bind(chain_id(chain))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<PositionRow, StoreError> {
                let index: i64 = row.try_get("index")?;
                Ok(PositionRow {
                    id: row.try_get("id")?,
                    index: index as u64,
                    shares: parse_u256("shares", row.try_get("shares")?)?,
                })
            })
            .collect()
    }

    async fn insert_position(&self, position: &NewPosition) -> Result<(), StoreError> {
        let v = &position.values;
        sqlx::query(
            r#"INSERT INTO positions (id, chain, "index", pool, strategy, shares, borrow,
                   shares_value, borrow_value, life, amount, price, created, updated)
               VALUES ($1, $2, $3, $4, $5::numeric, $6::numeric, $7::numeric, $8::numeric,
                   $9::numeric, $10::numeric, $11::numeric, $12::numeric, $13, $13)"#,
        )
        .bind(position.id)
        .bind(chain_id(position.chain))
        .bind(position.index as i64)
        .bind(position.pool.to_string())
        .bind(position.strategy.to_string())
        .bind(v.shares.to_string())
        .bind(v.borrow.to_string())
        .bind(v.shares_value.to_string())
        .bind(v.borrow_value.to_string())
        .bind(v.life.to_string())
        .bind(v.amount.to_string())
        .bind(v.price.to_string())
        .bind(position.created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_position(
        &self,
        id: i64,
        values: &PositionValues,
        updated: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE positions SET shares = $2::numeric, borrow = $3::numeric,
                   shares_value = $4::numeric, borrow_value = $5::numeric, life = $6::numeric,
                   amount = $7::numeric, price = $8::numeric, updated = $9
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(values.shares.to_string())
        .bind(values.borrow.to_string())
        .bind(values.shares_value.to_string())
        .bind(values.borrow_value.to_string())
        .bind(values.life.to_string())
        .bind(values.amount.to_string())
        .bind(values.price.to_string())
        .bind(updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_position_snapshot(&self, snapshot: &PositionSnapshot) -> Result<(), StoreError> {
        let v = &snapshot.values;
        sqlx::query(
            r#"INSERT INTO positions_history (id, chain, "index", shares, borrow, shares_value,
                   borrow_value, life, amount, price, time)
               VALUES ($1, $2, $3, $4::numeric, $5::numeric, $6::numeric, $7::numeric,
                   $8::numeric, $9::numeric, $10::numeric, $11)"#,
        )
        .bind(snapshot.id)
        .bind(chain_id(snapshot.chain))
        .bind(snapshot.index as i64)
        .bind(v.shares.to_string())
        .bind(v.borrow.to_string())
        .bind(v.shares_value.to_string())
        .bind(v.borrow_value.to_string())
        .bind(v.life.to_string())
        .bind(v.amount.to_string())
        .bind(v.price.to_string())
        .bind(snapshot.time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_pool_snapshot(&self, snapshot: &PoolSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO pools_history (id, chain, address, time, "index", share, supply,
                   borrow, rate, price)
               VALUES ($1, $2, $3, $4, $5::numeric, $6::numeric, $7::numeric, $8::numeric,
                   $9::numeric, $10::numeric)"#,
        )
        .bind(snapshot.id)
        .bind(chain_id(snapshot.chain))
        .bind(snapshot.address.to_string())
        .bind(snapshot.time)
        .bind(snapshot.index.to_string())
        .bind(snapshot.share.to_string())
        .bind(snapshot.supply.to_string())
        .bind(snapshot.borrow.to_string())
        .bind(snapshot.rate.to_string())
        .bind(snapshot.price.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_apy_snapshot(&self, snapshot: &ApySnapshot) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO apys_history (id, chain, address, time, apy, tvl) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(snapshot.id)
        .bind(chain_id(snapshot.chain))
        .bind(snapshot.address.to_string())
        .bind(snapshot.time)
        .bind(snapshot.apy)
        .bind(snapshot.tvl)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_strategy_profit(&self, profit: &StrategyProfit) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO strategies_profits (id, chain, block, time, strategy, earn, tvl) \
             VALUES ($1, $2, $3, $4, $5, $6::numeric, $7::numeric)",
        )
        .bind(profit.id)
        .bind(chain_id(profit.chain))
        .bind(profit.block as i64)
        .bind(profit.time)
        .bind(profit.strategy.to_string())
        .bind(profit.earn.to_string())
        .bind(profit.tvl.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
