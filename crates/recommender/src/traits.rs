//! Common interface of the recommendation algorithms.

use std::sync::Arc;

use anyhow::Result;
use data_loader::{DataIndex, User};

use crate::item_cf::ItemCf;
use crate::similarity::SimilarityEngine;
use crate::types::{Algorithm, Recommendation};
use crate::user_cf::UserCf;

/// A ranking algorithm answering per-user queries.
///
/// `Send + Sync` so one instance can serve queries from many threads.
pub trait Recommender: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// Up to `n_items` items for `user`, best first, none of which the
    /// user is already interested in.
    ///
    /// An empty list is a normal outcome (no history, `k = 0`).
    fn recommend(&self, user: &User, k: usize, n_items: usize) -> Result<Vec<Recommendation>>;

    /// Build whatever shared state the first query with `k` would build,
    /// so later queries only pay for ranking.
    fn prepare(&self, _k: usize) -> Result<()> {
        Ok(())
    }
}

impl Recommender for UserCf {
    fn algorithm(&self) -> Algorithm {
        Algorithm::UserCf
    }

    fn recommend(&self, user: &User, k: usize, n_items: usize) -> Result<Vec<Recommendation>> {
        Ok(UserCf::recommend(self, user, k, n_items))
    }
}

impl Recommender for ItemCf {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ItemCf
    }

    fn recommend(&self, user: &User, k: usize, n_items: usize) -> Result<Vec<Recommendation>> {
        ItemCf::recommend(self, user, k, n_items)
    }

    fn prepare(&self, k: usize) -> Result<()> {
        ItemCf::prepare(self, k)
    }
}

/// Construct the recommender for `algorithm`.
///
/// `threads` sizes the job pool of the ItemCF similarity build.
pub fn build_recommender(
    algorithm: Algorithm,
    data_index: Arc<DataIndex>,
    threads: usize,
) -> Arc<dyn Recommender> {
    match algorithm {
        Algorithm::UserCf => Arc::new(UserCf::new(data_index)),
        Algorithm::ItemCf => {
            let engine = Arc::new(SimilarityEngine::new(Arc::clone(&data_index)).with_threads(threads));
            Arc::new(ItemCf::new(data_index).with_engine(engine))
        }
    }
}
