use std::sync::Arc;

use keeper_store::{EventStream, Store, StoreError};

/// Resolves where a stream's next scan starts.
///
/// The cursor is never stored on its own; it is the highest block among the
/// stream's ingested rows, or the chain's genesis block when there are none.
#[derive(Clone)]
pub struct CursorTracker {
    store: Arc<dyn Store>,
    chain: u64,
    genesis_block: u64,
}

impl CursorTracker {
    pub fn new(store: Arc<dyn Store>, chain: u64, genesis_block: u64) -> Self {
        Self {
            store,
            chain,
            genesis_block,
        }
    }

    pub fn chain(&self) -> u64 {
        self.chain
    }

    /// Last block whose events are durably ingested for `stream`.
    pub async fn resolve(&self, stream: EventStream) -> Result<u64, StoreError> {
        let latest = self.store.latest_block(stream, self.chain).await?;
        Ok(latest.unwrap_or(self.genesis_block).max(self.genesis_block))
    }
}
