//! Load-time configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::log::DEFAULT_LOG_SHARDS;
use crate::store::DEFAULT_SHARD_COUNT;

/// Number of worker threads to use when none is configured:
/// the detected hardware parallelism, at least one.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1)
}

/// Settings for building a [`crate::DataIndex`] from the dataset files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Directory holding `users.csv`, `items.csv` and `interactions_train.csv`
    pub data_dir: PathBuf,
    /// Loader threads per file
    pub threads: usize,
    /// Shards per entity store
    pub shard_count: usize,
    /// Shards of the global interaction log
    pub log_shards: usize,
    /// Lines a loader thread takes per trip to the shared cursor
    pub entity_batch_size: usize,
    pub interaction_batch_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            threads: default_threads(),
            shard_count: DEFAULT_SHARD_COUNT,
            log_shards: DEFAULT_LOG_SHARDS,
            entity_batch_size: 100,
            interaction_batch_size: 500,
        }
    }
}

impl LoadConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Configure the loader thread count (clamped to at least 1)
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count.max(1);
        self
    }

    pub fn with_log_shards(mut self, log_shards: usize) -> Self {
        self.log_shards = log_shards.max(1);
        self
    }

    pub fn with_batch_sizes(mut self, entity: usize, interaction: usize) -> Self {
        self.entity_batch_size = entity.max(1);
        self.interaction_batch_size = interaction.max(1);
        self
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.csv")
    }

    pub fn items_path(&self) -> PathBuf {
        self.data_dir.join("items.csv")
    }

    pub fn interactions_path(&self) -> PathBuf {
        self.data_dir.join("interactions_train.csv")
    }

    /// Held-out interactions used as ground truth by the evaluation
    pub fn test_interactions_path(&self) -> PathBuf {
        self.data_dir.join("interactions_test.csv")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
