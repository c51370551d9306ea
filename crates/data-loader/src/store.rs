//! Sharded key -> entity maps.
//!
//! An [`EntityStore`] splits its key space into a fixed number of shards
//! (`id % shard_count`), each behind its own read/write lock, so concurrent
//! loader threads only contend when they hit the same shard.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use rayon::prelude::*;

use crate::entity::Entity;

/// Default number of shards per store
pub const DEFAULT_SHARD_COUNT: usize = 1000;

const SIZE_UNCOMPUTED: usize = usize::MAX;

type Shard<T> = RwLock<BTreeMap<u32, Arc<T>>>;

/// Concurrent store of users or items keyed by their numeric ID.
///
/// Insertion is first-write-wins: the source files may repeat an ID, and
/// the later rows are dropped.
#[derive(Debug)]
pub struct EntityStore<T> {
    shards: Vec<Shard<T>>,
    cached_len: AtomicUsize,
}

impl<T: Entity> EntityStore<T> {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARD_COUNT)
    }

    /// Create a store with `shard_count` shards (at least one)
    pub fn with_shards(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| RwLock::new(BTreeMap::new()))
            .collect();
        Self {
            shards,
            cached_len: AtomicUsize::new(SIZE_UNCOMPUTED),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, id: u32) -> &Shard<T> {
        &self.shards[id as usize % self.shards.len()]
    }

    /// Insert `entity` unless its ID is already present.
    ///
    /// Returns `true` if the entity was inserted, `false` if it was a
    /// duplicate and dropped.
    pub fn put(&self, entity: T) -> bool {
        let id = entity.id();
        let mut shard = self
            .shard(id)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if shard.contains_key(&id) {
            return false;
        }
        shard.insert(id, Arc::new(entity));
        true
    }

    /// Look up an entity by ID
    pub fn get(&self, id: u32) -> Option<Arc<T>> {
        self.shard(id)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.shard(id)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Number of stored entities.
    ///
    /// The sum over shards is cached after the first call; pass
    /// `update = true` to recount after further inserts.
    pub fn len(&self, update: bool) -> usize {
        let cached = self.cached_len.load(Ordering::Acquire);
        if cached != SIZE_UNCOMPUTED && !update {
            return cached;
        }
        let total: usize = self
            .shards
            .par_iter()
            .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum();
        self.cached_len.store(total, Ordering::Release);
        total
    }

    pub fn is_empty(&self) -> bool {
        self.len(true) == 0
    }

    /// Every stored entity, shard by shard and ascending ID within a shard
    pub fn all(&self) -> Vec<Arc<T>> {
        self.shards
            .par_iter()
            .flat_map_iter(|shard| {
                shard
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .values()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Largest stored ID, if any
    pub fn max_id(&self) -> Option<u32> {
        self.shards
            .par_iter()
            .filter_map(|shard| {
                shard
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .keys()
                    .next_back()
                    .copied()
            })
            .max()
    }
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
