//! # Recommender Crate
//!
//! Collaborative-filtering recommendations over a loaded [`DataIndex`].
//!
//! ## Components
//!
//! ### UserCF
//! "Users who like what you like also like...": scores neighbour users by
//! popularity-weighted shared interests and ranks what the `k` nearest of
//! them like.
//!
//! ### ItemCF
//! "Similar to what you like": sums precomputed item-item similarities.
//! The similarity index is built once, in parallel on a job pool, the first
//! time ItemCF is queried.
//!
//! ## Example Usage
//!
//! ```ignore
//! use recommender::{Algorithm, build_recommender};
//! use data_loader::{DataIndex, LoadConfig};
//! use std::sync::Arc;
//!
//! let data_index = Arc::new(DataIndex::load_from_files(&LoadConfig::new("data"))?);
//! let recommender = build_recommender(Algorithm::UserCf, data_index.clone(), 8);
//!
//! let user = data_index.get_user(42).unwrap();
//! for rec in recommender.recommend(&user, 20, 30)? {
//!     println!("{}", rec);
//! }
//! ```
//!
//! Ties in rank are broken by ascending item ID, so results are stable for
//! a given dataset.
//!
//! [`DataIndex`]: data_loader::DataIndex

// Public modules
pub mod item_cf;
pub mod ranking;
pub mod similarity;
pub mod traits;
pub mod types;
pub mod user_cf;
pub mod weights;

// Re-export commonly used types
pub use item_cf::ItemCf;
pub use similarity::{BuildStats, SimilarityEngine};
pub use traits::{Recommender, build_recommender};
pub use types::{Algorithm, Recommendation};
pub use user_cf::UserCf;
pub use weights::popularity_factor;
