//! Time-ordered row ids.
//!
//! Layout: milliseconds since 2010-01-01T00:00:00Z shifted left 12 bits, with
//! the low 12 bits taken from a per-process counter. Ids from one process are
//! increasing as long as fewer than 4096 are minted per millisecond.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

/// 2010-01-01T00:00:00Z in Unix milliseconds.
pub const ID_EPOCH_MS: i64 = 1_262_304_000_000;

const SEQUENCE_BITS: u32 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
pub struct IdGenerator {
    sequence: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> i64 {
        self.next_id_at(Utc::now())
    }

    /// Mint an id for a given instant. The counter is bumped before use.
    pub fn next_id_at(&self, now: DateTime<Utc>) -> i64 {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let elapsed = (now.timestamp_millis() - ID_EPOCH_MS).max(0);
        (elapsed << SEQUENCE_BITS) | (sequence & SEQUENCE_MASK) as i64
    }
}
