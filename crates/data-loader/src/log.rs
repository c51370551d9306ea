//! Global log of every accepted interaction record.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;

use crate::types::InteractionRecord;

/// Default number of log shards
pub const DEFAULT_LOG_SHARDS: usize = 10_000;

const SIZE_UNCOMPUTED: usize = usize::MAX;

/// Append-only store of interaction records, sharded by timestamp.
///
/// Together with the two interaction tables a record is linked into, the
/// log keeps the record alive.
#[derive(Debug)]
pub struct InteractionLog {
    shards: Vec<Mutex<Vec<Arc<InteractionRecord>>>>,
    cached_len: AtomicUsize,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_LOG_SHARDS)
    }

    pub fn with_shards(shard_count: usize) -> Self {
        Self {
            shards: (0..shard_count.max(1)).map(|_| Mutex::new(Vec::new())).collect(),
            cached_len: AtomicUsize::new(SIZE_UNCOMPUTED),
        }
    }

    pub fn add(&self, record: Arc<InteractionRecord>) {
        let slot = record.timestamp.rem_euclid(self.shards.len() as i64) as usize;
        self.shards[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Number of logged records, cached like `EntityStore::len`
    pub fn len(&self, update: bool) -> usize {
        let cached = self.cached_len.load(Ordering::Acquire);
        if cached != SIZE_UNCOMPUTED && !update {
            return cached;
        }
        let total: usize = self
            .shards
            .par_iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum();
        self.cached_len.store(total, Ordering::Release);
        total
    }

    pub fn is_empty(&self) -> bool {
        self.len(true) == 0
    }

    /// All records, latest first
    pub fn sorted_by_time(&self) -> Vec<Arc<InteractionRecord>> {
        let mut records: Vec<Arc<InteractionRecord>> = self
            .shards
            .par_iter()
            .flat_map_iter(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        records.par_sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }
}

impl Default for InteractionLog {
    fn default() -> Self {
        Self::new()
    }
}
