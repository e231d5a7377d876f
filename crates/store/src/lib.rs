//! Keeper persistence.
//!
//! The [`Store`] trait is the only way tasks touch the database. [`PgStore`]
//! backs production runs; [`MemoryStore`] backs tests.

mod error;
mod ids;
mod memory;
mod model;
mod postgres;
mod store;

pub use error::StoreError;
pub use ids::{IdGenerator, ID_EPOCH_MS};
pub use memory::{MemoryStore, StoredPosition};
pub use model::{
    ApySnapshot, EventStream, NewPosition, PoolSnapshot, PositionEvent, PositionRow,
    PositionSnapshot, PositionValues, StrategyProfit, TaskRun, TaskSchedule,
};
pub use postgres::PgStore;
pub use store::Store;
