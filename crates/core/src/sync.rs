//! Block-range log ingestion for the keeper's event streams.
//!
//! A stream has no stored cursor. Each sync resolves it from the highest
//! ingested block, scans forward in fixed block windows, and persists decoded
//! events in ascending order. Re-running after a crash re-scans at most the
//! window that was in flight.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use keeper_chain::{ChainClient, ChainError, ChainLog, EarnEvent, InvestorEvent, LogQuery};
use keeper_store::{EventStream, IdGenerator, PositionEvent, Store, StrategyProfit};

use crate::cursor::CursorTracker;

/// Stream-specific decoding and persistence.
#[async_trait]
pub trait LogIngestor: Send + Sync {
    /// Decoded log payload
    type Event: Send;
    /// What a persisted event is handed downstream as
    type Item: Send;

    fn stream(&self) -> EventStream;

    fn addresses(&self) -> Vec<Address>;

    fn topics(&self) -> Vec<B256>;

    fn decode(&self, log: &ChainLog) -> Result<Self::Event, ChainError>;

    /// Write one event. `Ok(None)` means the event was deliberately skipped.
    async fn persist(&self, log: &ChainLog, event: Self::Event) -> Result<Option<Self::Item>>;
}

pub struct EventSynchronizer<I> {
    chain: Arc<dyn ChainClient>,
    cursor: CursorTracker,
    ingestor: I,
    batch_blocks: u64,
}

impl<I: LogIngestor> EventSynchronizer<I> {
    pub fn new(chain: Arc<dyn ChainClient>, cursor: CursorTracker, ingestor: I, batch_blocks: u64) -> Self {
        Self {
            chain,
            cursor,
            ingestor,
            batch_blocks: batch_blocks.max(1),
        }
    }

    /// Ingest everything between the stream cursor and the chain head.
    ///
    /// Rows persisted before a failure are still handed back: they are in the
    /// store and the next cursor already lies past them.
    #[instrument(skip(self), fields(stream = %self.ingestor.stream()))]
    pub async fn sync(&self) -> SyncOutcome<I::Item> {
        let mut ingested = Vec::new();
        let interrupted = self.scan(&mut ingested).await.err();
        if let Some(e) = &interrupted {
            warn!(ingested = ingested.len(), error = %format!("{e:#}"), "Sync interrupted");
        }
        SyncOutcome {
            ingested,
            interrupted,
        }
    }

    async fn scan(&self, ingested: &mut Vec<I::Item>) -> Result<()> {
        let stream = self.ingestor.stream();
        let mut cursor = self
            .cursor
            .resolve(stream)
            .await
            .with_context(|| format!("failed to resolve {stream} cursor"))?;
        let latest = self
            .chain
            .latest_block_number()
            .await
            .context("failed to read latest block")?;

        let addresses = self.ingestor.addresses();
        let topics = self.ingestor.topics();

        debug!(cursor, latest, "Starting sync");
        while cursor < latest {
            let to_block = cursor.saturating_add(self.batch_blocks).min(latest);
            let query = LogQuery {
                addresses: addresses.clone(),
                topics: topics.clone(),
                from_block: cursor + 1,
                to_block,
            };
            let logs = self
                .chain
                .get_logs(&query)
                .await
                .with_context(|| format!("failed to fetch logs {}..={}", query.from_block, to_block))?;

            debug!(from = query.from_block, to = to_block, logs = logs.len(), "Fetched window");
            for log in &logs {
                let event = match self.ingestor.decode(log) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(
                            block = log.block_number,
                            log_index = log.log_index,
                            error = %e,
                            "Skipping undecodable log"
                        );
                        continue;
                    }
                };
                let persisted = self.ingestor.persist(log, event).await.with_context(|| {
                    format!("failed to persist log {}:{}", log.block_number, log.log_index)
                })?;
                if let Some(item) = persisted {
                    ingested.push(item);
                }
            }

            cursor = cursor.saturating_add(self.batch_blocks);
        }

        info!(ingested = ingested.len(), head = latest, "Sync complete");
        Ok(())
    }
}

/// What one sync persisted, and the error that cut it short, if any.
#[derive(Debug)]
pub struct SyncOutcome<T> {
    pub ingested: Vec<T>,
    pub interrupted: Option<anyhow::Error>,
}

impl<T> SyncOutcome<T> {
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.interrupted {
            Some(e) => Err(e),
            None => Ok(self.ingested),
        }
    }
}

/// A position event that was just written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedPositionEvent {
    pub block: u64,
    pub event: InvestorEvent,
}

/// Investor `Edit` / `Kill` logs into `positions_events`.
pub struct PositionEventIngestor {
    store: Arc<dyn Store>,
    ids: Arc<IdGenerator>,
    chain_id: u64,
    investor: Address,
}

impl PositionEventIngestor {
    pub fn new(store: Arc<dyn Store>, ids: Arc<IdGenerator>, chain_id: u64, investor: Address) -> Self {
        Self {
            store,
            ids,
            chain_id,
            investor,
        }
    }
}

#[async_trait]
impl LogIngestor for PositionEventIngestor {
    type Event = InvestorEvent;
    type Item = IngestedPositionEvent;

    fn stream(&self) -> EventStream {
        EventStream::PositionEvents
    }

    fn addresses(&self) -> Vec<Address> {
        vec![self.investor]
    }

    fn topics(&self) -> Vec<B256> {
        InvestorEvent::topics()
    }

    fn decode(&self, log: &ChainLog) -> Result<InvestorEvent, ChainError> {
        InvestorEvent::decode(log)
    }

    async fn persist(&self, log: &ChainLog, event: InvestorEvent) -> Result<Option<IngestedPositionEvent>> {
        self.store
            .insert_position_event(&PositionEvent {
                id: self.ids.next_id(),
                chain: self.chain_id,
                index: event.position_id(),
                block: log.block_number,
                name: event.name().to_string(),
                data: event.fields(),
            })
            .await
            .with_context(|| format!("failed to store {} for position {}", event.name(), event.position_id()))?;

        Ok(Some(IngestedPositionEvent {
            block: log.block_number,
            event,
        }))
    }
}

/// A strategy profit that was just written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedEarn {
    pub strategy: Address,
    pub block: u64,
    pub time: DateTime<Utc>,
    pub event: EarnEvent,
}

/// Strategy `Earn` logs into `strategies_profits`. Zero-profit harvests are
/// not recorded.
pub struct EarnIngestor {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn Store>,
    ids: Arc<IdGenerator>,
    chain_id: u64,
    strategies: Vec<Address>,
}

impl EarnIngestor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn Store>,
        ids: Arc<IdGenerator>,
        chain_id: u64,
        strategies: Vec<Address>,
    ) -> Self {
        Self {
            chain,
            store,
            ids,
            chain_id,
            strategies,
        }
    }
}

#[async_trait]
impl LogIngestor for EarnIngestor {
    type Event = EarnEvent;
    type Item = IngestedEarn;

    fn stream(&self) -> EventStream {
        EventStream::StrategyProfits
    }

    fn addresses(&self) -> Vec<Address> {
        self.strategies.clone()
    }

    fn topics(&self) -> Vec<B256> {
        EarnEvent::topics()
    }

    fn decode(&self, log: &ChainLog) -> Result<EarnEvent, ChainError> {
        EarnEvent::decode(log)
    }

    async fn persist(&self, log: &ChainLog, event: EarnEvent) -> Result<Option<IngestedEarn>> {
        if event.profit.is_zero() {
            debug!(strategy = %log.address, block = log.block_number, "Skipping zero-profit earn");
            return Ok(None);
        }

        let timestamp = self
            .chain
            .block_timestamp(log.block_number)
            .await
            .with_context(|| format!("failed to read timestamp of block {}", log.block_number))?;
        let time = i64::try_from(timestamp)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .with_context(|| format!("block {} has invalid timestamp {timestamp}", log.block_number))?;

        self.store
            .insert_strategy_profit(&StrategyProfit {
                id: self.ids.next_id(),
                chain: self.chain_id,
                block: log.block_number,
                time,
                strategy: log.address,
                earn: event.profit,
                tvl: event.tvl,
            })
            .await
            .with_context(|| format!("failed to store profit for {}", log.address))?;

        Ok(Some(IngestedEarn {
            strategy: log.address,
            block: log.block_number,
            time,
            event,
        }))
    }
}
