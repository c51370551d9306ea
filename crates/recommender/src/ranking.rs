//! Top-N selection over accumulated scores.
//!
//! Order is weight descending, then ID ascending, so equal weights never
//! depend on map iteration or thread scheduling.

use std::cmp::Ordering;

fn by_weight_then_id<K: Ord>(a: &(K, f64), b: &(K, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// The `n` best entries of `scores`, best first.
///
/// Uses a partial selection when fewer than all entries are kept.
pub fn top_n<K: Ord>(scores: impl IntoIterator<Item = (K, f64)>, n: usize) -> Vec<(K, f64)> {
    if n == 0 {
        return Vec::new();
    }
    let mut entries: Vec<(K, f64)> = scores.into_iter().collect();
    if n < entries.len() {
        entries.select_nth_unstable_by(n - 1, by_weight_then_id);
        entries.truncate(n);
    }
    entries.sort_unstable_by(by_weight_then_id);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_n_sorted_and_truncated() {
        let scores = vec![(1u32, 0.2), (2, 0.9), (3, 0.5), (4, 0.1)];
        assert_eq!(top_n(scores, 2), vec![(2, 0.9), (3, 0.5)]);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let scores = vec![(7u32, 1.0), (3, 1.0), (5, 1.0), (9, 2.0)];
        assert_eq!(top_n(scores.clone(), 3), vec![(9, 2.0), (3, 1.0), (5, 1.0)]);
        assert_eq!(top_n(scores, 10), vec![(9, 2.0), (3, 1.0), (5, 1.0), (7, 1.0)]);
    }

    #[test]
    fn test_zero_and_empty() {
        assert!(top_n(vec![(1u32, 1.0)], 0).is_empty());
        assert!(top_n(Vec::<(u32, f64)>::new(), 5).is_empty());
    }
}
