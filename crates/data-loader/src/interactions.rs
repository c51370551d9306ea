//! Per-entity interaction tables and the interest caches derived from them.
//!
//! Every user and item owns one [`InteractionIndex`]:
//! `type -> (peer id -> records)`, where the peer is the item for a user and
//! the user for an item. Each type has its own lock so loader threads
//! appending different interaction types never contend.
//!
//! The [`InterestCache`] holds the set of peers with at least one positive
//! (CLICK, BOOKMARK or REPLY) interaction. It is computed on first read and
//! only recomputed on explicit request.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{InteractionRecord, InteractionType};

/// ID of the entity on the other side of an interaction
pub type PeerId = u32;

/// Sorted set of peer IDs an entity showed positive interest in
pub type InterestSet = BTreeSet<PeerId>;

type PeerTable = BTreeMap<PeerId, Vec<Arc<InteractionRecord>>>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// InteractionIndex
// =============================================================================

/// Adjacency table of one entity, one sub-map per interaction type.
///
/// Within one peer's sequence records keep arrival order, which is not
/// necessarily time order. [`InteractionIndex::sort_by_time`] puts them
/// latest first and runs once at the end of a file load.
#[derive(Debug, Default)]
pub struct InteractionIndex {
    tables: [RwLock<PeerTable>; 4],
}

impl InteractionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` to the sequence of `peer` under its interaction type.
    ///
    /// The whole sub-map for that type is locked for the append.
    pub fn add(&self, peer: PeerId, record: Arc<InteractionRecord>) {
        let mut table = write(&self.tables[record.kind.slot()]);
        table.entry(peer).or_default().push(record);
    }

    /// Number of distinct peers with at least one record of `kind`
    pub fn peer_count(&self, kind: InteractionType) -> usize {
        read(&self.tables[kind.slot()]).len()
    }

    /// Number of records of `kind`, duplicates included
    pub fn record_count(&self, kind: InteractionType) -> usize {
        read(&self.tables[kind.slot()]).values().map(Vec::len).sum()
    }

    /// Number of records over all interaction types
    pub fn total_records(&self) -> usize {
        InteractionType::ALL
            .iter()
            .map(|&kind| self.record_count(kind))
            .sum()
    }

    /// Records of `kind` exchanged with `peer`, in arrival order
    pub fn records_with(&self, kind: InteractionType, peer: PeerId) -> Vec<Arc<InteractionRecord>> {
        read(&self.tables[kind.slot()])
            .get(&peer)
            .cloned()
            .unwrap_or_default()
    }

    /// Copy of the whole sub-map for `kind`, ordered by peer ID
    pub fn snapshot(&self, kind: InteractionType) -> Vec<(PeerId, Vec<Arc<InteractionRecord>>)> {
        read(&self.tables[kind.slot()])
            .iter()
            .map(|(&peer, records)| (peer, records.clone()))
            .collect()
    }

    /// Collect every peer appearing under a positive interaction type.
    ///
    /// DELETE records never contribute a peer, but they do not remove one
    /// contributed by another type either.
    pub fn positive_peers(&self) -> InterestSet {
        let mut peers = InterestSet::new();
        for kind in InteractionType::POSITIVE {
            let table = read(&self.tables[kind.slot()]);
            peers.extend(
                table
                    .iter()
                    .filter(|(_, records)| !records.is_empty())
                    .map(|(&peer, _)| peer),
            );
        }
        peers
    }

    /// Reorder every per-peer sequence latest first
    pub fn sort_by_time(&self) {
        for table in &self.tables {
            let mut table = write(table);
            for records in table.values_mut() {
                records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            }
        }
    }
}

// =============================================================================
// InterestCache
// =============================================================================

#[derive(Debug, Default)]
enum CacheState {
    #[default]
    Uncomputed,
    Ready(Arc<InterestSet>),
}

/// Lazily computed interest set of one entity.
///
/// Reads of a ready cache only take the shared lock. The first computation
/// (or a forced refresh) happens under the exclusive lock, re-checking the
/// state after acquiring it, so concurrent first readers compute once.
/// A computed empty set stays cached like any other.
///
/// Lock order: `compute` runs with the cache's exclusive lock held and, for
/// entities, takes the read locks of the positive interaction tables one at
/// a time. Nothing takes a table lock and then a cache lock, so the order is
/// always cache before table. `InteractionIndex::add` only ever holds its one
/// table lock and can proceed while a computation waits on another table.
#[derive(Debug, Default)]
pub struct InterestCache {
    state: RwLock<CacheState>,
}

impl InterestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached set, computing it with `compute` if needed.
    ///
    /// With `update = true` the set is always recomputed.
    pub fn get_or_compute<F>(&self, update: bool, compute: F) -> Arc<InterestSet>
    where
        F: FnOnce() -> InterestSet,
    {
        if !update {
            if let CacheState::Ready(set) = &*read(&self.state) {
                return Arc::clone(set);
            }
        }

        let mut state = write(&self.state);
        if !update {
            if let CacheState::Ready(set) = &*state {
                return Arc::clone(set);
            }
        }
        let set = Arc::new(compute());
        *state = CacheState::Ready(Arc::clone(&set));
        set
    }

    pub fn is_computed(&self) -> bool {
        matches!(*read(&self.state), CacheState::Ready(_))
    }

    /// Drop the cached set; the next read recomputes it
    pub fn invalidate(&self) {
        *write(&self.state) = CacheState::Uncomputed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn record(user: u32, item: u32, kind: InteractionType, ts: i64) -> Arc<InteractionRecord> {
        Arc::new(InteractionRecord::new(user, item, kind, ts))
    }

    #[test]
    fn test_add_keeps_arrival_order() {
        let index = InteractionIndex::new();
        index.add(5, record(1, 5, InteractionType::Click, 30));
        index.add(5, record(1, 5, InteractionType::Click, 10));
        index.add(5, record(1, 5, InteractionType::Click, 20));

        let times: Vec<i64> = index
            .records_with(InteractionType::Click, 5)
            .iter()
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(times, vec![30, 10, 20]);

        index.sort_by_time();
        let times: Vec<i64> = index
            .records_with(InteractionType::Click, 5)
            .iter()
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(times, vec![30, 20, 10]);
    }

    #[test]
    fn test_counts_per_type() {
        let index = InteractionIndex::new();
        index.add(5, record(1, 5, InteractionType::Click, 1));
        index.add(5, record(1, 5, InteractionType::Click, 2));
        index.add(7, record(1, 7, InteractionType::Reply, 3));

        assert_eq!(index.peer_count(InteractionType::Click), 1);
        assert_eq!(index.record_count(InteractionType::Click), 2);
        assert_eq!(index.peer_count(InteractionType::Bookmark), 0);
        assert_eq!(index.total_records(), 3);
        assert!(index.records_with(InteractionType::Delete, 5).is_empty());
    }

    #[test]
    fn test_positive_peers_exclude_delete_only() {
        let index = InteractionIndex::new();
        index.add(5, record(1, 5, InteractionType::Click, 1));
        index.add(5, record(1, 5, InteractionType::Delete, 2));
        index.add(7, record(1, 7, InteractionType::Reply, 3));
        index.add(9, record(1, 9, InteractionType::Delete, 4));

        let peers: Vec<u32> = index.positive_peers().into_iter().collect();
        assert_eq!(peers, vec![5, 7]);
    }

    #[test]
    fn test_cache_computes_once() {
        let cache = InterestCache::new();
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            InterestSet::from([1, 2])
        };

        assert!(!cache.is_computed());
        let first = cache.get_or_compute(false, compute);
        let second = cache.get_or_compute(false, || InterestSet::from([9]));
        assert_eq!(*first, *second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_computed());
    }

    #[test]
    fn test_cache_update_recomputes() {
        let cache = InterestCache::new();
        cache.get_or_compute(false, || InterestSet::from([1]));
        let refreshed = cache.get_or_compute(true, || InterestSet::from([1, 2]));
        assert_eq!(refreshed.len(), 2);

        cache.invalidate();
        assert!(!cache.is_computed());
    }

    #[test]
    fn test_empty_set_stays_cached() {
        let cache = InterestCache::new();
        cache.get_or_compute(false, InterestSet::new);
        let again = cache.get_or_compute(false, || InterestSet::from([3]));
        assert!(again.is_empty());
    }

    #[test]
    fn test_concurrent_first_access() {
        let cache = Arc::new(InterestCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache.get_or_compute(false, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        InterestSet::from([4, 2])
                    })
                })
            })
            .collect();

        for handle in handles {
            let set = handle.join().unwrap();
            assert_eq!(set.len(), 2);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refresh_during_concurrent_appends() {
        let index = InteractionIndex::new();
        let cache = InterestCache::new();

        thread::scope(|scope| {
            for writer in 0..4u32 {
                let index = &index;
                scope.spawn(move || {
                    for peer in 0..200 {
                        let kind = InteractionType::ALL[(peer % 4) as usize];
                        index.add(writer * 1000 + peer, record(1, peer, kind, i64::from(peer)));
                    }
                });
            }
            for _ in 0..4 {
                let (index, cache) = (&index, &cache);
                scope.spawn(move || {
                    for _ in 0..50 {
                        cache.get_or_compute(true, || index.positive_peers());
                    }
                });
            }
        });

        // Every fourth peer only has a DELETE record
        let set = cache.get_or_compute(true, || index.positive_peers());
        assert_eq!(set.len(), 4 * 150);
    }
}
