//! # Data Loader Crate
//!
//! In-memory storage for the user/item interaction dataset, loaded from
//! tab-separated files and shared read-mostly by the recommenders.
//!
//! ## Main Components
//!
//! - **types**: Plain domain data (profiles, interaction records, IDs)
//! - **interactions**: Per-entity interaction tables and interest caches
//! - **similar**: Bounded, sorted similar-item lists
//! - **entity**: `User` and `Item`, and the `Entity` trait they share
//! - **store**: Sharded, concurrently writable `EntityStore`
//! - **log**: Global `InteractionLog`
//! - **index**: `DataIndex`, the context object tying the stores together
//! - **parser** / **loader**: Lenient line parsing and parallel file loading
//! - **export**: Joined interaction export
//! - **config**: `LoadConfig`
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{DataIndex, LoadConfig};
//!
//! let config = LoadConfig::new("data").with_threads(8);
//! let index = DataIndex::load_from_files(&config)?;
//!
//! let user = index.get_user(1).unwrap();
//! println!("User {} likes {} items", user.profile.id, user.interested_items().len());
//! ```

// Public modules
pub mod config;
pub mod entity;
pub mod error;
pub mod export;
pub mod index;
pub mod interactions;
pub mod loader;
pub mod log;
pub mod parser;
pub mod similar;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{LoadConfig, default_threads};
pub use entity::{Entity, Item, User};
pub use error::{DataLoadError, Result};
pub use export::write_joined_interactions;
pub use index::DataIndex;
pub use interactions::{InteractionIndex, InterestCache, InterestSet, PeerId};
pub use log::InteractionLog;
pub use similar::SimilarItems;
pub use store::EntityStore;
pub use types::{
    // Type aliases
    CodeSet,
    ItemId,
    Timestamp,
    UserId,
    // Core types
    InteractionRecord,
    InteractionType,
    ItemProfile,
    SimilarItem,
    UserProfile,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_index() -> DataIndex {
        DataIndex::with_config(&LoadConfig::default().with_shard_count(16).with_log_shards(16))
    }

    #[test]
    fn test_data_index_creation() {
        let index = empty_index();
        let (users, items, interactions) = index.counts();

        assert_eq!(users, 0);
        assert_eq!(items, 0);
        assert_eq!(interactions, 0);
    }

    #[test]
    fn test_insert_user() {
        let index = empty_index();

        let mut profile = UserProfile::new(1);
        profile.country = "de".to_string();
        index.insert_user(User::new(profile));

        let retrieved = index.get_user(1).unwrap();
        assert_eq!(retrieved.id(), 1);
        assert_eq!(retrieved.profile.country, "de");
    }

    #[test]
    fn test_insert_interaction() {
        let index = empty_index();
        index.insert_user(User::with_id(1));
        index.insert_item(Item::with_id(1193));

        index
            .record_interaction(1, 1193, InteractionType::Bookmark, 978_300_760)
            .unwrap();

        let user = index.get_user(1).unwrap();
        assert_eq!(user.interactions().total_records(), 1);
        assert!(user.interested_items().contains(&1193));

        let item = index.get_item(1193).unwrap();
        assert!(item.interested_users().contains(&1));
    }

    #[test]
    fn test_empty_queries() {
        let index = empty_index();

        // Querying non-existent data should return None or empty sets
        assert!(index.get_user(999).is_none());
        assert!(index.get_item(999).is_none());
        assert!(index.users().all().is_empty());
        assert!(index.interactions().sorted_by_time().is_empty());
    }
}
