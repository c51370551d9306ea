//! Popularity penalty applied to co-occurrence counts.
//!
//! A peer shared by two entities counts for `1 / ln(1 + n)`, where `n` is
//! the size of that peer's own interest set. Heavy users and blockbuster
//! items therefore say less about similarity than niche ones.

use std::sync::OnceLock;

/// Factors for `n < FACTOR_TABLE_SIZE` are precomputed
pub const FACTOR_TABLE_SIZE: usize = 1000;

static FACTORS: OnceLock<Vec<f64>> = OnceLock::new();

fn compute(n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    1.0 / (1.0 + n as f64).ln()
}

fn table() -> &'static [f64] {
    FACTORS.get_or_init(|| (0..FACTOR_TABLE_SIZE).map(compute).collect())
}

/// `1 / ln(1 + n)`; zero for an empty interest set
pub fn popularity_factor(n: usize) -> f64 {
    match table().get(n) {
        Some(&factor) => factor,
        None => compute(n),
    }
}
