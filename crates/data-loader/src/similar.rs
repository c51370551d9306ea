//! Bounded, similarity-descending list of an item's nearest items.

use std::sync::{Mutex, PoisonError};

use crate::types::{ItemId, SimilarItem};

/// Top-K similar items of one item, guarded by its own lock.
///
/// The list only ever improves: an entry is inserted while there is room,
/// and once full a newcomer must beat the current worst entry, which is then
/// evicted. Equal similarities are placed ahead of existing ones, so among
/// ties at capacity the last writer wins the slot.
#[derive(Debug, Default)]
pub struct SimilarItems {
    entries: Mutex<Vec<SimilarItem>>,
}

impl SimilarItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `item_id` if it belongs in the top `capacity`.
    ///
    /// Returns whether the list changed.
    pub fn try_insert(&self, item_id: ItemId, similarity: f32, capacity: usize) -> bool {
        if capacity == 0 {
            return false;
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= capacity {
            match entries.last() {
                Some(worst) if similarity > worst.similarity => {
                    entries.pop();
                }
                _ => return false,
            }
        }

        let pos = entries.partition_point(|e| e.similarity > similarity);
        entries.insert(pos, SimilarItem { item_id, similarity });
        true
    }

    /// Copy of the current list, best first
    pub fn snapshot(&self) -> Vec<SimilarItem> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &SimilarItems) -> Vec<ItemId> {
        list.snapshot().iter().map(|e| e.item_id).collect()
    }

    #[test]
    fn test_insert_sorted_until_full() {
        let list = SimilarItems::new();
        assert!(list.try_insert(1, 0.2, 3));
        assert!(list.try_insert(2, 0.9, 3));
        assert!(list.try_insert(3, 0.5, 3));

        assert_eq!(ids(&list), vec![2, 3, 1]);
    }

    #[test]
    fn test_full_list_evicts_worst() {
        let list = SimilarItems::new();
        list.try_insert(1, 0.2, 2);
        list.try_insert(2, 0.9, 2);

        // Not better than the worst entry
        assert!(!list.try_insert(3, 0.1, 2));
        assert!(!list.try_insert(4, 0.2, 2));
        assert_eq!(ids(&list), vec![2, 1]);

        assert!(list.try_insert(5, 0.5, 2));
        assert_eq!(ids(&list), vec![2, 5]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_noop() {
        let list = SimilarItems::new();
        assert!(!list.try_insert(1, 1.0, 0));
        assert!(list.is_empty());
    }

    #[test]
    fn test_final_contents_independent_of_order() {
        let inputs = [(1, 0.3), (2, 0.8), (3, 0.1), (4, 0.6), (5, 0.4)];

        let forward = SimilarItems::new();
        for &(id, sim) in &inputs {
            forward.try_insert(id, sim, 3);
        }
        let backward = SimilarItems::new();
        for &(id, sim) in inputs.iter().rev() {
            backward.try_insert(id, sim, 3);
        }

        assert_eq!(ids(&forward), vec![2, 4, 5]);
        assert_eq!(ids(&forward), ids(&backward));
    }
}
