//! Held-out interactions the recommendations are scored against.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use data_loader::loader::open_data_file;
use data_loader::parser::parse_interaction_line;
use data_loader::{InteractionRecord, InteractionType, ItemId, UserId};
use tracing::{debug, instrument};

use crate::error::Result;

/// Relevant items per user. DELETE interactions are not relevance signals
/// and are dropped.
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    by_user: BTreeMap<UserId, BTreeSet<ItemId>>,
}

impl GroundTruth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a test interactions file (same layout as the training file)
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let mut truth = Self::new();
        let mut dropped = 0usize;
        for (offset, line) in open_data_file(path)?.enumerate() {
            let line = line?;
            if let Some(record) = parse_interaction_line(&line, offset + 2)? {
                if !truth.add(&record) {
                    dropped += 1;
                }
            }
        }
        debug!(users = truth.len(), dropped, "ground truth loaded");
        Ok(truth)
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a InteractionRecord>) -> Self {
        let mut truth = Self::new();
        for record in records {
            truth.add(record);
        }
        truth
    }

    /// Returns false for DELETE records, which are ignored
    pub fn add(&mut self, record: &InteractionRecord) -> bool {
        if record.kind == InteractionType::Delete {
            return false;
        }
        self.by_user
            .entry(record.user_id)
            .or_default()
            .insert(record.item_id);
        true
    }

    pub fn relevant(&self, user_id: UserId) -> Option<&BTreeSet<ItemId>> {
        self.by_user.get(&user_id)
    }

    /// Users in ascending ID order with their relevant items
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &BTreeSet<ItemId>)> {
        self.by_user.iter()
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.by_user.keys().copied().collect()
    }

    /// Number of users
    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvaluationError;
    use data_loader::DataLoadError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_skips_delete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("interactions_test.csv");
        fs::write(&path, "user_id\titem_id\tinteraction_type\tcreated_at\n1\t10\t1\t5\n1\t11\t4\t6\n2\t10\t3\t7\n\n").unwrap();

        let truth = GroundTruth::load(&path).unwrap();
        assert_eq!(truth.len(), 2);
        assert_eq!(truth.relevant(1).unwrap().len(), 1);
        assert!(truth.relevant(2).unwrap().contains(&10));
        assert!(truth.relevant(3).is_none());
    }

    #[test]
    fn test_delete_only_user_absent() {
        let records = [
            InteractionRecord::new(5, 1, InteractionType::Delete, 0),
            InteractionRecord::new(6, 1, InteractionType::Click, 0),
        ];
        let truth = GroundTruth::from_records(&records);
        assert_eq!(truth.user_ids(), vec![6]);
    }

    #[test]
    fn test_invalid_type_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("interactions_test.csv");
        fs::write(&path, "header\n1\t10\t8\t5\n").unwrap();

        let err = GroundTruth::load(&path).unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::Load(DataLoadError::InvalidInteractionType { code: 8, line: 2 })
        ));
    }
}
