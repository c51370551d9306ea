//! Users and items as stored in the entity stores.
//!
//! Both kinds share the same shape: immutable attributes plus an interaction
//! table and an interest cache that accumulate after construction. The
//! [`Entity`] trait captures that shared part so the store, the loader and
//! the algorithms can treat users and items uniformly.

use std::sync::Arc;

use crate::interactions::{InteractionIndex, InterestCache, InterestSet, PeerId};
use crate::similar::SimilarItems;
use crate::types::{InteractionRecord, ItemId, ItemProfile, SimilarItem, Timestamp, UserId, UserProfile};

/// Behaviour shared by users and items.
pub trait Entity: Send + Sync + 'static {
    /// Human readable kind, used in logs and errors
    const KIND: &'static str;

    fn id(&self) -> u32;

    /// The ID on the other side of `record` from this entity's point of view
    fn peer_of(record: &InteractionRecord) -> PeerId;

    fn interactions(&self) -> &InteractionIndex;

    fn interest_cache(&self) -> &InterestCache;

    /// Link `record` into this entity's interaction table
    fn add_interaction(&self, record: Arc<InteractionRecord>) {
        self.interactions().add(Self::peer_of(&record), record);
    }

    /// Peers with at least one CLICK, BOOKMARK or REPLY interaction.
    ///
    /// Computed on first call and cached; interactions added afterwards are
    /// only reflected when called with `update = true`.
    fn interest_set(&self, update: bool) -> Arc<InterestSet> {
        self.interest_cache()
            .get_or_compute(update, || self.interactions().positive_peers())
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug)]
pub struct User {
    pub profile: UserProfile,
    interactions: InteractionIndex,
    interests: InterestCache,
}

impl User {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            interactions: InteractionIndex::new(),
            interests: InterestCache::new(),
        }
    }

    /// A user with default attributes, handy for tests and synthetic data
    pub fn with_id(id: UserId) -> Self {
        Self::new(UserProfile::new(id))
    }

    /// Items this user interacted with positively
    pub fn interested_items(&self) -> Arc<InterestSet> {
        self.interest_set(false)
    }
}

impl Entity for User {
    const KIND: &'static str = "User";

    fn id(&self) -> u32 {
        self.profile.id
    }

    fn peer_of(record: &InteractionRecord) -> PeerId {
        record.item_id
    }

    fn interactions(&self) -> &InteractionIndex {
        &self.interactions
    }

    fn interest_cache(&self) -> &InterestCache {
        &self.interests
    }
}

// =============================================================================
// Item
// =============================================================================

#[derive(Debug)]
pub struct Item {
    pub profile: ItemProfile,
    interactions: InteractionIndex,
    interests: InterestCache,
    similar: SimilarItems,
}

impl Item {
    pub fn new(profile: ItemProfile) -> Self {
        Self {
            profile,
            interactions: InteractionIndex::new(),
            interests: InterestCache::new(),
            similar: SimilarItems::new(),
        }
    }

    /// An item with default attributes, handy for tests and synthetic data
    pub fn with_id(id: ItemId) -> Self {
        Self::new(ItemProfile::new(id))
    }

    pub fn created_at(&self) -> Timestamp {
        self.profile.created_at
    }

    /// Users who interacted with this item positively
    pub fn interested_users(&self) -> Arc<InterestSet> {
        self.interest_set(false)
    }

    /// Offer `other` as a similar item, keeping at most `capacity` entries
    pub fn add_similar_item(&self, other: ItemId, similarity: f32, capacity: usize) -> bool {
        self.similar.try_insert(other, similarity, capacity)
    }

    /// Current similar-items list, most similar first
    pub fn similar_items(&self) -> Vec<SimilarItem> {
        self.similar.snapshot()
    }

    pub fn clear_similar_items(&self) {
        self.similar.clear();
    }
}

impl Entity for Item {
    const KIND: &'static str = "Item";

    fn id(&self) -> u32 {
        self.profile.id
    }

    fn peer_of(record: &InteractionRecord) -> PeerId {
        record.user_id
    }

    fn interactions(&self) -> &InteractionIndex {
        &self.interactions
    }

    fn interest_cache(&self) -> &InterestCache {
        &self.interests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InteractionType;

    #[test]
    fn test_user_interest_set_from_spec_example() {
        // {(5, CLICK), (5, DELETE), (7, REPLY)} -> {5, 7}
        let user = User::with_id(1);
        for (item, kind) in [
            (5, InteractionType::Click),
            (5, InteractionType::Delete),
            (7, InteractionType::Reply),
        ] {
            user.add_interaction(Arc::new(InteractionRecord::new(1, item, kind, 100)));
        }

        let set: Vec<u32> = user.interested_items().iter().copied().collect();
        assert_eq!(set, vec![5, 7]);
    }

    #[test]
    fn test_item_indexes_by_user() {
        let item = Item::with_id(10);
        item.add_interaction(Arc::new(InteractionRecord::new(3, 10, InteractionType::Bookmark, 1)));
        item.add_interaction(Arc::new(InteractionRecord::new(4, 10, InteractionType::Delete, 2)));

        let set: Vec<u32> = item.interested_users().iter().copied().collect();
        assert_eq!(set, vec![3]);
    }

    #[test]
    fn test_cache_not_invalidated_by_later_writes() {
        let user = User::with_id(1);
        user.add_interaction(Arc::new(InteractionRecord::new(1, 5, InteractionType::Click, 1)));
        assert_eq!(user.interest_set(false).len(), 1);

        user.add_interaction(Arc::new(InteractionRecord::new(1, 6, InteractionType::Click, 2)));
        assert_eq!(user.interest_set(false).len(), 1);
        assert_eq!(user.interest_set(true).len(), 2);
    }
}
