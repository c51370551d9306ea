//! Per-user scoring of a recommendation list.
//!
//! ```text
//! P@k     = |top-k ∩ relevant| / k              k ∈ {2, 4, 6, 20, 30}
//! recall  = |top-30 ∩ relevant| / |relevant|
//! success = 1 if top-30 hits anything
//! score   = 20·(P@2 + P@4 + recall + success) + 10·(P@6 + P@20)
//! ```

use std::collections::BTreeSet;

use data_loader::{ItemId, UserId};
use serde::{Deserialize, Serialize};

/// Length of the list that is scored
pub const RECALL_SIZE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserScore {
    pub user_id: UserId,
    /// Hits within the top `RECALL_SIZE`
    pub n_correct: usize,
    pub precision_at_2: f64,
    pub precision_at_4: f64,
    pub precision_at_6: f64,
    pub precision_at_20: f64,
    pub precision_at_30: f64,
    pub recall: f64,
    pub success: bool,
    pub score: f64,
}

fn hits(recommended: &[ItemId], relevant: &BTreeSet<ItemId>, k: usize) -> usize {
    recommended
        .iter()
        .take(k)
        .filter(|id| relevant.contains(id))
        .count()
}

fn precision_at(recommended: &[ItemId], relevant: &BTreeSet<ItemId>, k: usize) -> f64 {
    hits(recommended, relevant, k) as f64 / k as f64
}

/// Score `recommended` (best first) against the user's relevant items
pub fn score_user(user_id: UserId, recommended: &[ItemId], relevant: &BTreeSet<ItemId>) -> UserScore {
    let n_correct = hits(recommended, relevant, RECALL_SIZE);
    let recall = if relevant.is_empty() {
        0.0
    } else {
        n_correct as f64 / relevant.len() as f64
    };
    let success = n_correct > 0;

    let precision_at_2 = precision_at(recommended, relevant, 2);
    let precision_at_4 = precision_at(recommended, relevant, 4);
    let precision_at_6 = precision_at(recommended, relevant, 6);
    let precision_at_20 = precision_at(recommended, relevant, 20);

    let score = 20.0 * (precision_at_2 + precision_at_4 + recall + if success { 1.0 } else { 0.0 })
        + 10.0 * (precision_at_6 + precision_at_20);

    UserScore {
        user_id,
        n_correct,
        precision_at_2,
        precision_at_4,
        precision_at_6,
        precision_at_20,
        precision_at_30: n_correct as f64 / RECALL_SIZE as f64,
        recall,
        success,
        score,
    }
}
