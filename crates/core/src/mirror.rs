//! Off-chain mirror of every open position.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use keeper_chain::call::expect_uint;
use keeper_chain::contracts::{helper, investor, uint_arg};
use keeper_chain::{ChainClient, PositionView};
use keeper_store::{IdGenerator, NewPosition, PositionRow, PositionSnapshot, PositionValues, Store};

use crate::clock::Clock;

/// Which position indexes are worth looking at.
///
/// Every index below `nextPosition()` counts, except positions already
/// mirrored with zero shares (closed). Indexes not mirrored yet are included.
#[derive(Debug, Clone, Default)]
pub struct PositionIndex {
    pub count: u64,
    pub mirrored: BTreeMap<u64, PositionRow>,
}

impl PositionIndex {
    pub async fn load(
        chain: &dyn ChainClient,
        store: &dyn Store,
        chain_id: u64,
        investor_address: Address,
    ) -> Result<Self> {
        let mirrored = store
            .list_positions(chain_id)
            .await
            .context("failed to list mirrored positions")?
            .into_iter()
            .map(|row| (row.index, row))
            .collect();

        let call = investor::next_position();
        let values = chain
            .read(investor_address, &call, &[])
            .await
            .context("failed to read nextPosition")?;
        let count = expect_uint(&values, 0, call.name())?;
        let count = u64::try_from(count).with_context(|| format!("position count {count} out of range"))?;

        Ok(Self { count, mirrored })
    }

    pub fn live(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.count).filter(|index| {
            self.mirrored
                .get(index)
                .map_or(true, |row| !row.shares.is_zero())
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub inserted: usize,
    pub updated: usize,
}

pub struct PositionMirror {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn Store>,
    ids: Arc<IdGenerator>,
    clock: Arc<dyn Clock>,
    chain_id: u64,
    investor: Address,
    helper: Address,
}

impl PositionMirror {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn Store>,
        ids: Arc<IdGenerator>,
        clock: Arc<dyn Clock>,
        chain_id: u64,
        investor: Address,
        helper: Address,
    ) -> Self {
        Self {
            chain,
            store,
            ids,
            clock,
            chain_id,
            investor,
            helper,
        }
    }

    /// Refresh the mirror and append one history row per live position.
    #[instrument(skip(self), fields(chain = self.chain_id))]
    pub async fn run(&self) -> Result<MirrorReport> {
        let index =
            PositionIndex::load(self.chain.as_ref(), self.store.as_ref(), self.chain_id, self.investor).await?;
        let mut report = MirrorReport::default();

        for position in index.live() {
            let view = self.peek(position).await?;
            let values = values_of(&view);
            let now = self.clock.now();

            match index.mirrored.get(&position) {
                Some(row) => {
                    self.store
                        .update_position(row.id, &values, now)
                        .await
                        .with_context(|| format!("failed to update position {position}"))?;
                    report.updated += 1;
                }
                None => {
                    self.store
                        .insert_position(&NewPosition {
                            id: self.ids.next_id(),
                            chain: self.chain_id,
                            index: position,
                            pool: view.pool,
                            strategy: view.strategy,
                            values: values.clone(),
                            created: now,
                        })
                        .await
                        .with_context(|| format!("failed to insert position {position}"))?;
                    debug!(position, pool = %view.pool, "Mirrored new position");
                    report.inserted += 1;
                }
            }

            self.store
                .insert_position_snapshot(&PositionSnapshot {
                    id: self.ids.next_id(),
                    chain: self.chain_id,
                    index: position,
                    values,
                    time: now,
                })
                .await
                .with_context(|| format!("failed to snapshot position {position}"))?;
        }

        info!(
            count = index.count,
            inserted = report.inserted,
            updated = report.updated,
            "Positions mirrored"
        );
        Ok(report)
    }

    async fn peek(&self, position: u64) -> Result<PositionView> {
        let args: [DynSolValue; 1] = [uint_arg(U256::from(position))];
        let values = self
            .chain
            .read(self.helper, &helper::peek_position(), &args)
            .await
            .with_context(|| format!("failed to peek position {position}"))?;
        Ok(PositionView::from_values(&values)?)
    }
}

fn values_of(view: &PositionView) -> PositionValues {
    PositionValues {
        shares: view.shares,
        borrow: view.borrow,
        shares_value: view.shares_value,
        borrow_value: view.borrow_value,
        life: view.life,
        amount: view.amount,
        price: view.price,
    }
}
