//! Item-item similarity index for ItemCF.
//!
//! ## Algorithm
//! For items `i` and `j` with interested-user sets `N(i)` and `N(j)`:
//!
//! ```text
//! sim(i, j) = Σ_{u ∈ N(i) ∩ N(j)} 1 / ln(1 + |N(u)|)
//!             ───────────────────────────────────────
//!                     sqrt(|N(i)| · |N(j)|)
//! ```
//!
//! Every unordered pair is one job on a [`JobPool`]. A job offers the score
//! to both items' bounded similar-item lists, so each list ends up holding
//! that item's `k` best neighbours. Pairs without a shared user are skipped.
//!
//! The build is all-pairs, O(n²) in the number of items.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use data_loader::{DataIndex, Entity, InterestSet, Item, UserId, default_threads};
use job_pool::JobPool;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::weights::popularity_factor;

/// Popularity factor of every user with a non-empty interest set
type UserWeights = HashMap<UserId, f64>;

/// Summary of one similarity build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub items: usize,
    pub pairs: usize,
    /// Pairs with at least one shared user
    pub linked_pairs: usize,
    pub capacity: usize,
}

/// Builds and owns the pool-wide similar-item index.
///
/// The lists themselves live on the items; the engine tracks whether they
/// have been built and with which capacity.
pub struct SimilarityEngine {
    data: Arc<DataIndex>,
    threads: usize,
    /// `None` until the first build completes
    built: Mutex<Option<BuildStats>>,
}

impl SimilarityEngine {
    pub fn new(data: Arc<DataIndex>) -> Self {
        Self {
            data,
            threads: default_threads(),
            built: Mutex::new(None),
        }
    }

    /// Configure the number of pool workers used by builds (default: all cores)
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Stats of the last completed build
    pub fn built(&self) -> Option<BuildStats> {
        *self.built.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build the index unless a build already completed.
    ///
    /// Concurrent callers wait for the one build in progress. A completed
    /// index is reused even when `k` differs from the capacity it was built
    /// with. Returns true if this call performed the build.
    pub fn ensure_built(&self, k: usize) -> Result<bool> {
        let mut built = self.built.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stats) = *built {
            if stats.capacity != k {
                debug!(built_with = stats.capacity, requested = k, "reusing similarity index");
            }
            return Ok(false);
        }
        *built = Some(self.build(k)?);
        Ok(true)
    }

    /// Rebuild every item's similar-item list with capacity `k`
    pub fn build_all(&self, k: usize) -> Result<BuildStats> {
        let mut built = self.built.lock().unwrap_or_else(PoisonError::into_inner);
        let stats = self.build(k)?;
        *built = Some(stats);
        Ok(stats)
    }

    /// Similarity of two items, computed directly rather than read from
    /// the index
    pub fn similarity(&self, a: &Item, b: &Item) -> f64 {
        pair_similarity(&a.interested_users(), &b.interested_users(), |u| {
            self.data
                .get_user(u)
                .map(|user| popularity_factor(user.interested_items().len()))
                .unwrap_or(0.0)
        })
    }

    #[instrument(skip(self), fields(threads = self.threads))]
    fn build(&self, k: usize) -> Result<BuildStats> {
        let start = Instant::now();

        let items = self.data.items().all();
        items.par_iter().for_each(|item| {
            item.clear_similar_items();
            item.interested_users();
        });
        let weights = Arc::new(self.user_weights());
        debug!(items = items.len(), weighted_users = weights.len(), "similarity inputs ready");

        let linked = Arc::new(AtomicUsize::new(0));
        let mut pairs = 0usize;
        let mut pool = JobPool::new(self.threads).context("Failed to start similarity job pool")?;

        for (i, a) in items.iter().enumerate() {
            for b in &items[i + 1..] {
                let (a, b) = (Arc::clone(a), Arc::clone(b));
                let weights = Arc::clone(&weights);
                let linked = Arc::clone(&linked);
                pool.submit(move || {
                    let sim = pair_similarity(&a.interested_users(), &b.interested_users(), |u| {
                        weights.get(&u).copied().unwrap_or(0.0)
                    });
                    if sim > 0.0 {
                        linked.fetch_add(1, Ordering::Relaxed);
                        a.add_similar_item(b.id(), sim as f32, k);
                        b.add_similar_item(a.id(), sim as f32, k);
                    }
                })
                .context("Failed to submit similarity job")?;
                pairs += 1;
            }
        }
        pool.terminate().context("Similarity job pool failed")?;

        let stats = BuildStats {
            items: items.len(),
            pairs,
            linked_pairs: linked.load(Ordering::Relaxed),
            capacity: k,
        };
        info!(
            items = stats.items,
            pairs = stats.pairs,
            linked_pairs = stats.linked_pairs,
            elapsed = ?start.elapsed(),
            "similarity index built"
        );
        Ok(stats)
    }

    fn user_weights(&self) -> UserWeights {
        self.data
            .users()
            .all()
            .par_iter()
            .filter_map(|user| {
                let n = user.interested_items().len();
                (n > 0).then(|| (user.id(), popularity_factor(n)))
            })
            .collect()
    }
}

impl std::fmt::Debug for SimilarityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityEngine")
            .field("threads", &self.threads)
            .field("built", &self.built())
            .finish()
    }
}

/// Weighted co-visitation score of two interested-user sets
fn pair_similarity(a: &InterestSet, b: &InterestSet, weight: impl Fn(UserId) -> f64) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let shared: f64 = small
        .iter()
        .filter(|u| large.contains(u))
        .map(|&u| weight(u))
        .sum();
    if shared == 0.0 {
        return 0.0;
    }
    shared / ((a.len() * b.len()) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{InteractionType, LoadConfig, User};

    fn index_with(interactions: &[(u32, u32)]) -> Arc<DataIndex> {
        let index = DataIndex::with_config(&LoadConfig::default().with_shard_count(8).with_log_shards(8));
        for &(user, item) in interactions {
            index.insert_user(User::with_id(user));
            index.insert_item(Item::with_id(item));
        }
        for &(user, item) in interactions {
            index
                .record_interaction(user, item, InteractionType::Click, 0)
                .unwrap();
        }
        Arc::new(index)
    }

    #[test]
    fn test_pair_similarity_formula() {
        // Items 10 and 20 share user 1, who likes 2 items
        let data = index_with(&[(1, 10), (1, 20), (2, 20)]);
        let engine = SimilarityEngine::new(Arc::clone(&data));
        let a = data.get_item(10).unwrap();
        let b = data.get_item(20).unwrap();

        let expected = (1.0 / 3f64.ln()) / (2f64).sqrt();
        assert!((engine.similarity(&a, &b) - expected).abs() < 1e-9);
        assert_eq!(engine.similarity(&a, &b), engine.similarity(&b, &a));
    }

    #[test]
    fn test_build_fills_both_sides() {
        let data = index_with(&[(1, 10), (1, 20), (2, 20), (2, 30)]);
        let engine = SimilarityEngine::new(Arc::clone(&data)).with_threads(2);
        let stats = engine.build_all(5).unwrap();

        assert_eq!(stats.items, 3);
        assert_eq!(stats.pairs, 3);
        // 10-30 share nobody
        assert_eq!(stats.linked_pairs, 2);

        let ids = |id: u32| -> Vec<u32> {
            data.get_item(id)
                .unwrap()
                .similar_items()
                .iter()
                .map(|s| s.item_id)
                .collect()
        };
        assert_eq!(ids(10), vec![20]);
        assert_eq!(ids(30), vec![20]);
        assert_eq!(ids(20).len(), 2);
    }

    #[test]
    fn test_ensure_built_runs_once() {
        let data = index_with(&[(1, 10), (1, 20)]);
        let engine = SimilarityEngine::new(data).with_threads(1);
        assert!(engine.built().is_none());
        assert!(engine.ensure_built(3).unwrap());
        assert!(!engine.ensure_built(3).unwrap());
        assert!(!engine.ensure_built(8).unwrap());
        assert_eq!(engine.built().unwrap().capacity, 3);
    }

    #[test]
    fn test_rebuild_replaces_lists() {
        let data = index_with(&[(1, 10), (1, 20), (1, 30)]);
        let engine = SimilarityEngine::new(Arc::clone(&data)).with_threads(2);
        engine.build_all(2).unwrap();
        assert_eq!(data.get_item(10).unwrap().similar_items().len(), 2);

        engine.build_all(1).unwrap();
        assert_eq!(data.get_item(10).unwrap().similar_items().len(), 1);
    }
}
