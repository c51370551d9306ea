//! UserCF - user-based collaborative filtering
//!
//! "Users who like what you like also like these items"
//!
//! ## Algorithm
//! 1. Take the items the user is interested in, `N(u)`
//! 2. For each of those items, every other interested user `v` gains
//!    `1 / ln(1 + |N(i)|)`; popular items say little about taste
//! 3. Normalize: `w(v) /= sqrt(|N(u)| · |N(v)|)`
//! 4. Keep the `k` most similar users
//! 5. Each neighbour's items outside `N(u)` gain the neighbour's weight
//! 6. Return the `n_items` best items

use std::collections::BTreeMap;
use std::sync::Arc;

use data_loader::{DataIndex, Entity, ItemId, User, UserId};
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::ranking::top_n;
use crate::types::Recommendation;
use crate::weights::popularity_factor;

/// User-similarity recommender
#[derive(Debug, Clone)]
pub struct UserCf {
    /// Shared reference to the data index
    data_index: Arc<DataIndex>,
}

impl UserCf {
    pub fn new(data_index: Arc<DataIndex>) -> Self {
        Self { data_index }
    }

    /// Recommend up to `n_items` items for `user` from its `k` nearest users
    #[instrument(skip(self, user), fields(user_id = user.id()))]
    pub fn recommend(&self, user: &User, k: usize, n_items: usize) -> Vec<Recommendation> {
        if k == 0 {
            warn!("UserCF called with k = 0, nothing to recommend");
            return Vec::new();
        }
        let interests = user.interested_items();
        if interests.is_empty() {
            debug!("User {} has no positive interactions", user.id());
            return Vec::new();
        }

        // Step 1: score and keep the k most similar users
        let neighbours = top_n(self.similar_users(user, interests.len()), k);
        debug!("Selected {} neighbour users", neighbours.len());

        // Step 2: rank what the neighbours like and the user hasn't seen
        let mut ranks: BTreeMap<ItemId, f64> = BTreeMap::new();
        for (neighbour_id, weight) in neighbours {
            let Some(neighbour) = self.data_index.get_user(neighbour_id) else {
                continue;
            };
            for &item_id in neighbour.interested_items().difference(&interests) {
                *ranks.entry(item_id).or_insert(0.0) += weight;
            }
        }

        let recommendations: Vec<Recommendation> = top_n(ranks, n_items)
            .into_iter()
            .map(|(item_id, weight)| Recommendation::new(item_id, weight))
            .collect();
        debug!("Generated {} UserCF recommendations", recommendations.len());
        recommendations
    }

    /// Normalized similarity of every user sharing an item with `user`
    fn similar_users(&self, user: &User, n_interests: usize) -> Vec<(UserId, f64)> {
        let target = user.id();

        let mut co_weights: BTreeMap<UserId, f64> = BTreeMap::new();
        for &item_id in user.interested_items().iter() {
            let Some(item) = self.data_index.get_item(item_id) else {
                continue;
            };
            let fans = item.interested_users();
            let factor = popularity_factor(fans.len());
            for &other in fans.iter().filter(|&&other| other != target) {
                *co_weights.entry(other).or_insert(0.0) += factor;
            }
        }

        // Normalization only reads other users' caches, so it runs in parallel
        co_weights
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .filter_map(|(other, weight)| {
                let n_other = self.data_index.get_user(other)?.interested_items().len();
                if n_other == 0 {
                    return None;
                }
                Some((other, weight / ((n_interests * n_other) as f64).sqrt()))
            })
            .collect()
    }
}
