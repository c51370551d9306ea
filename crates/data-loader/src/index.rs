//! DataIndex: the context object every component is handed.
//!
//! It owns the user and item stores and the global interaction log. There
//! are no process-wide singletons; the CLI builds one `DataIndex`, wraps it
//! in an `Arc` and threads it through the recommenders and the evaluator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::config::LoadConfig;
use crate::entity::{Entity, Item, User};
use crate::error::{DataLoadError, Result};
use crate::log::InteractionLog;
use crate::store::EntityStore;
use crate::types::{InteractionRecord, InteractionType, ItemId, Timestamp, UserId};

/// The in-memory database of users, items and interactions.
#[derive(Debug)]
pub struct DataIndex {
    users: EntityStore<User>,
    items: EntityStore<Item>,
    interactions: InteractionLog,
    max_user_id: AtomicU32,
    max_item_id: AtomicU32,
}

impl DataIndex {
    /// Creates a new, empty DataIndex with default shard counts
    pub fn new() -> Self {
        Self::with_config(&LoadConfig::default())
    }

    /// Creates an empty DataIndex sized by `config`
    pub fn with_config(config: &LoadConfig) -> Self {
        Self {
            users: EntityStore::with_shards(config.shard_count),
            items: EntityStore::with_shards(config.shard_count),
            interactions: InteractionLog::with_shards(config.log_shards),
            max_user_id: AtomicU32::new(0),
            max_item_id: AtomicU32::new(0),
        }
    }

    // Getters

    pub fn users(&self) -> &EntityStore<User> {
        &self.users
    }

    pub fn items(&self) -> &EntityStore<Item> {
        &self.items
    }

    pub fn interactions(&self) -> &InteractionLog {
        &self.interactions
    }

    pub fn get_user(&self, id: UserId) -> Option<Arc<User>> {
        self.users.get(id)
    }

    pub fn get_item(&self, id: ItemId) -> Option<Arc<Item>> {
        self.items.get(id)
    }

    /// Largest user and item IDs seen by the loader
    pub fn max_ids(&self) -> (UserId, ItemId) {
        (
            self.max_user_id.load(Ordering::Relaxed),
            self.max_item_id.load(Ordering::Relaxed),
        )
    }

    /// (users, items, interactions), recounted
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.users.len(true),
            self.items.len(true),
            self.interactions.len(true),
        )
    }

    // Mutators, used during the load phase

    /// Insert a user; duplicates of an existing ID are dropped
    pub fn insert_user(&self, user: User) -> bool {
        let id = user.id();
        let inserted = self.users.put(user);
        if inserted {
            self.max_user_id.fetch_max(id, Ordering::Relaxed);
        } else {
            debug!("User {} already exists, duplicate dropped", id);
        }
        inserted
    }

    /// Insert an item; duplicates of an existing ID are dropped
    pub fn insert_item(&self, item: Item) -> bool {
        let id = item.id();
        let inserted = self.items.put(item);
        if inserted {
            self.max_item_id.fetch_max(id, Ordering::Relaxed);
        } else {
            debug!("Item {} already exists, duplicate dropped", id);
        }
        inserted
    }

    /// Validate and record one interaction.
    ///
    /// Both ends must exist and the interaction may not predate the item.
    /// On success the record is appended to the global log and linked into
    /// the user's and the item's interaction tables.
    pub fn record_interaction(
        &self,
        user_id: UserId,
        item_id: ItemId,
        kind: InteractionType,
        timestamp: Timestamp,
    ) -> Result<Arc<InteractionRecord>> {
        let user = self.users.get(user_id).ok_or(DataLoadError::MissingReference {
            entity: User::KIND.to_string(),
            id: user_id,
        })?;
        let item = self.items.get(item_id).ok_or(DataLoadError::MissingReference {
            entity: Item::KIND.to_string(),
            id: item_id,
        })?;
        if timestamp < item.created_at() {
            return Err(DataLoadError::InteractionBeforeCreation {
                user: user_id,
                item: item_id,
                timestamp,
                created_at: item.created_at(),
            });
        }

        let record = Arc::new(InteractionRecord::new(user_id, item_id, kind, timestamp));
        self.interactions.add(Arc::clone(&record));
        user.add_interaction(Arc::clone(&record));
        item.add_interaction(Arc::clone(&record));
        Ok(record)
    }

    /// Reorder every entity's per-peer sequences latest first
    pub fn sort_interactions_by_time(&self) {
        self.users.all().par_iter().for_each(|u| u.interactions().sort_by_time());
        self.items.all().par_iter().for_each(|i| i.interactions().sort_by_time());
    }

    /// Recompute every interest cache, e.g. after interactions were added
    /// to entities whose cache had already been read
    pub fn refresh_interest_sets(&self) {
        self.users.all().par_iter().for_each(|u| {
            u.interest_set(true);
        });
        self.items.all().par_iter().for_each(|i| {
            i.interest_set(true);
        });
    }
}

// Implement Default trait for convenience
impl Default for DataIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemProfile;

    fn small_index() -> DataIndex {
        let index = DataIndex::with_config(&LoadConfig::default().with_shard_count(8).with_log_shards(8));
        index.insert_user(User::with_id(1));
        index.insert_item(Item::new(ItemProfile {
            id: 10,
            created_at: 1000,
            ..Default::default()
        }));
        index
    }

    #[test]
    fn test_record_links_both_sides() {
        let index = small_index();
        index
            .record_interaction(1, 10, InteractionType::Click, 1500)
            .unwrap();

        let user = index.get_user(1).unwrap();
        let item = index.get_item(10).unwrap();
        assert_eq!(user.interactions().records_with(InteractionType::Click, 10).len(), 1);
        assert_eq!(item.interactions().records_with(InteractionType::Click, 1).len(), 1);
        assert_eq!(index.counts(), (1, 1, 1));
    }

    #[test]
    fn test_unknown_peer_rejected() {
        let index = small_index();
        let err = index
            .record_interaction(2, 10, InteractionType::Click, 1500)
            .unwrap_err();
        assert!(matches!(err, DataLoadError::MissingReference { id: 2, .. }));

        let err = index
            .record_interaction(1, 11, InteractionType::Click, 1500)
            .unwrap_err();
        assert!(matches!(err, DataLoadError::MissingReference { id: 11, .. }));
        assert_eq!(index.interactions().len(true), 0);
    }

    #[test]
    fn test_interaction_before_item_creation_rejected() {
        let index = small_index();
        let err = index
            .record_interaction(1, 10, InteractionType::Click, 999)
            .unwrap_err();
        assert!(matches!(err, DataLoadError::InteractionBeforeCreation { .. }));

        // Equal to the creation time is fine
        assert!(index.record_interaction(1, 10, InteractionType::Click, 1000).is_ok());
    }

    #[test]
    fn test_max_ids_track_inserts() {
        let index = small_index();
        index.insert_user(User::with_id(42));
        index.insert_user(User::with_id(7));
        assert_eq!(index.max_ids(), (42, 10));
        assert!(!index.insert_user(User::with_id(42)));
    }

    #[test]
    fn test_refresh_interest_sets() {
        let index = small_index();
        let user = index.get_user(1).unwrap();
        assert!(user.interested_items().is_empty());

        index.record_interaction(1, 10, InteractionType::Reply, 2000).unwrap();
        assert!(user.interested_items().is_empty());

        index.refresh_interest_sets();
        assert_eq!(user.interested_items().len(), 1);
    }
}
