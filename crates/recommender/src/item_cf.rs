//! ItemCF - item-based collaborative filtering
//!
//! "Items similar to what you like"
//!
//! Every item the user is interested in contributes its precomputed
//! neighbours (see [`crate::similarity`]); a candidate's rank is the sum of
//! its similarities to the user's items. The similarity index is built on
//! the first query and shared by every later one.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use data_loader::{DataIndex, Entity, ItemId, User};
use tracing::{debug, instrument, warn};

use crate::ranking::top_n;
use crate::similarity::SimilarityEngine;
use crate::types::Recommendation;

/// Item-similarity recommender
#[derive(Debug, Clone)]
pub struct ItemCf {
    data_index: Arc<DataIndex>,
    engine: Arc<SimilarityEngine>,
}

impl ItemCf {
    pub fn new(data_index: Arc<DataIndex>) -> Self {
        let engine = Arc::new(SimilarityEngine::new(Arc::clone(&data_index)));
        Self { data_index, engine }
    }

    /// Use an existing engine, e.g. one sized with a specific thread count
    pub fn with_engine(mut self, engine: Arc<SimilarityEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn engine(&self) -> &Arc<SimilarityEngine> {
        &self.engine
    }

    /// Build the similarity index with capacity `k` unless it already exists.
    ///
    /// Unlike [`ItemCf::recommend`] this does not depend on any user having
    /// a history.
    pub fn prepare(&self, k: usize) -> Result<()> {
        if k == 0 {
            warn!("ItemCF prepared with k = 0, similarity index not built");
            return Ok(());
        }
        self.engine.ensure_built(k)?;
        Ok(())
    }

    /// Recommend up to `n_items` items for `user`.
    ///
    /// `k` is the similar-item list capacity used if this call triggers the
    /// index build.
    #[instrument(skip(self, user), fields(user_id = user.id()))]
    pub fn recommend(&self, user: &User, k: usize, n_items: usize) -> Result<Vec<Recommendation>> {
        if k == 0 {
            warn!("ItemCF called with k = 0, nothing to recommend");
            return Ok(Vec::new());
        }
        let interests = user.interested_items();
        if interests.is_empty() {
            debug!("User {} has no positive interactions", user.id());
            return Ok(Vec::new());
        }

        self.engine.ensure_built(k)?;

        let mut ranks: BTreeMap<ItemId, f64> = BTreeMap::new();
        for &item_id in interests.iter() {
            let Some(item) = self.data_index.get_item(item_id) else {
                continue;
            };
            for similar in item.similar_items() {
                if !interests.contains(&similar.item_id) {
                    *ranks.entry(similar.item_id).or_insert(0.0) += f64::from(similar.similarity);
                }
            }
        }

        let recommendations: Vec<Recommendation> = top_n(ranks, n_items)
            .into_iter()
            .map(|(item_id, weight)| Recommendation::new(item_id, weight))
            .collect();
        debug!("Generated {} ItemCF recommendations", recommendations.len());
        Ok(recommendations)
    }
}
