//! Parallel bulk loading of the dataset files into a [`DataIndex`].
//!
//! Each file is read by a group of threads sharing one line cursor. A
//! thread holds the cursor lock only while it pulls the next batch of lines
//! and numbers them; parsing and index insertion run outside the lock and
//! take only the store's own shard/type locks.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use tracing::{debug, error, info, instrument};

use crate::config::LoadConfig;
use crate::error::{DataLoadError, Result};
use crate::index::DataIndex;
use crate::parser::{parse_interaction_line, parse_item_line, parse_user_line};

/// Open a data file and consume its header line.
///
/// Returns the remaining lines. A file that can't be opened or has no
/// header is fatal for the run.
pub fn open_data_file(path: &Path) -> Result<Lines<BufReader<File>>> {
    let file = File::open(path).map_err(|source| DataLoadError::FileNotFound {
        path: path.display().to_string(),
        source,
    })?;
    let mut lines = BufReader::new(file).lines();
    match lines.next() {
        Some(Ok(_header)) => Ok(lines),
        Some(Err(e)) => Err(e.into()),
        None => Err(DataLoadError::MissingHeader {
            file: path.display().to_string(),
        }),
    }
}

struct LineCursor<R> {
    lines: Lines<R>,
    line_no: usize,
}

/// Feed `lines` to `process` from `threads` worker threads.
///
/// Workers take `batch_size` lines at a time. Line numbers start at
/// `first_line_no` and are assigned in file order. The first error returned
/// by `process` (or an I/O error) stops all workers and is returned.
/// Returns the number of lines handed to `process`.
pub fn load_lines_parallel<R, F>(
    lines: Lines<R>,
    first_line_no: usize,
    threads: usize,
    batch_size: usize,
    process: F,
) -> Result<usize>
where
    R: BufRead + Send,
    F: Fn(&str, usize) -> Result<()> + Sync,
{
    let batch_size = batch_size.max(1);
    let cursor = Mutex::new(LineCursor {
        lines,
        line_no: first_line_no.saturating_sub(1),
    });
    let aborted = AtomicBool::new(false);
    let processed = AtomicUsize::new(0);

    let worker = || -> Result<()> {
        let mut batch: Vec<(usize, String)> = Vec::with_capacity(batch_size);
        loop {
            if aborted.load(Ordering::Relaxed) {
                return Ok(());
            }

            batch.clear();
            {
                let mut cursor = cursor.lock().unwrap_or_else(PoisonError::into_inner);
                while batch.len() < batch_size {
                    match cursor.lines.next() {
                        Some(Ok(line)) => {
                            cursor.line_no += 1;
                            batch.push((cursor.line_no, line));
                        }
                        Some(Err(e)) => {
                            aborted.store(true, Ordering::Relaxed);
                            return Err(e.into());
                        }
                        None => break,
                    }
                }
            }

            for (line_no, line) in &batch {
                if let Err(e) = process(line, *line_no) {
                    aborted.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            }
            processed.fetch_add(batch.len(), Ordering::Relaxed);

            if batch.len() < batch_size {
                return Ok(());
            }
        }
    };

    thread::scope(|scope| {
        let handles: Vec<_> = (0..threads.max(1)).map(|_| scope.spawn(&worker)).collect();
        let mut first_error = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(processed.load(Ordering::Relaxed)),
        }
    })
}

impl DataIndex {
    /// Load the whole dataset described by `config`.
    ///
    /// Users and items are loaded first so that interactions can be
    /// resolved against them. Once all interactions are in, every per-peer
    /// sequence is reordered latest first.
    #[instrument(skip(config), fields(data_dir = %config.data_dir.display(), threads = config.threads))]
    pub fn load_from_files(config: &LoadConfig) -> Result<Self> {
        let start = Instant::now();
        let index = DataIndex::with_config(config);

        info!("Loading users data...");
        index.load_users(&config.users_path(), config)?;
        info!("Loading items data...");
        index.load_items(&config.items_path(), config)?;
        info!("Loading interaction data...");
        index.load_interactions(&config.interactions_path(), config)?;
        index.sort_interactions_by_time();

        let (users, items, interactions) = index.counts();
        info!(
            users,
            items,
            interactions,
            elapsed = ?start.elapsed(),
            "DataIndex successfully built"
        );
        Ok(index)
    }

    /// Load users.csv into the user store
    pub fn load_users(&self, path: &Path, config: &LoadConfig) -> Result<usize> {
        let lines = open_data_file(path)?;
        let read = load_lines_parallel(lines, 2, config.threads, config.entity_batch_size, |line, no| {
            if let Some(user) = parse_user_line(line, no) {
                self.insert_user(user);
            }
            Ok(())
        })?;
        debug!(lines = read, users = self.users().len(true), "users loaded");
        Ok(read)
    }

    /// Load items.csv into the item store
    pub fn load_items(&self, path: &Path, config: &LoadConfig) -> Result<usize> {
        let lines = open_data_file(path)?;
        let read = load_lines_parallel(lines, 2, config.threads, config.entity_batch_size, |line, no| {
            if let Some(item) = parse_item_line(line, no) {
                self.insert_item(item);
            }
            Ok(())
        })?;
        debug!(lines = read, items = self.items().len(true), "items loaded");
        Ok(read)
    }

    /// Load an interactions file, validating each record against the stores.
    ///
    /// Records with an unknown user or item are dropped; records older than
    /// their item are logged and dropped. An invalid interaction type aborts
    /// the load.
    pub fn load_interactions(&self, path: &Path, config: &LoadConfig) -> Result<usize> {
        let lines = open_data_file(path)?;
        let rejected = AtomicUsize::new(0);
        let read = load_lines_parallel(
            lines,
            2,
            config.threads,
            config.interaction_batch_size,
            |line, no| {
                let Some(record) = parse_interaction_line(line, no)? else {
                    return Ok(());
                };
                match self.record_interaction(record.user_id, record.item_id, record.kind, record.timestamp) {
                    Ok(_) => {}
                    Err(DataLoadError::MissingReference { entity, id }) => {
                        debug!(line = no, "cannot find {} {}", entity, id);
                        rejected.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        error!(line = no, "Wrong interaction record: {}", e);
                        rejected.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Ok(())
            },
        )?;
        debug!(
            lines = read,
            rejected = rejected.load(Ordering::Relaxed),
            interactions = self.interactions().len(true),
            "interactions loaded"
        );
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::types::{InteractionRecord, InteractionType};
    use std::fs;
    use std::sync::Arc;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn write_dataset(dir: &Path) {
        fs::write(
            dir.join("users.csv"),
            "id\tjobroles\tcareer_level\n\
             1\t1,2\t3\t0\t0\tde\t1\t1\t1\t1\t1\t\n\
             2\t3\t2\t0\t0\tat\t2\t1\t1\t1\t0\t\n\
             2\t9\t2\t0\t0\tch\t2\t1\t1\t1\t0\t\n",
        )
        .unwrap();
        fs::write(
            dir.join("items.csv"),
            "id\ttitle\n\
             10\t1\t1\t0\t0\tde\t1\t0\t0\t1\t5\t100\t1\n\
             20\t2\t1\t0\t0\tde\t1\t0\t0\t1\t5\t100\t1\n\
             30\t3\t1\t0\t0\tde\t1\t0\t0\t1\t5\t500\t1\n",
        )
        .unwrap();
        fs::write(
            dir.join("interactions_train.csv"),
            "user_id\titem_id\tinteraction_type\tcreated_at\n\
             1\t10\t1\t200\n\
             1\t20\t1\t200\n\
             1\t20\t1\t400\n\
             2\t20\t1\t200\n\
             2\t30\t1\t600\n\
             2\t30\t1\t300\n\
             3\t10\t1\t200\n\
             1\t99\t2\t200\n",
        )
        .unwrap();
    }

    #[test]
    fn test_load_from_files() {
        let dir = TempDir::new().unwrap();
        write_dataset(dir.path());

        let config = LoadConfig::new(dir.path())
            .with_threads(3)
            .with_shard_count(7)
            .with_log_shards(5)
            .with_batch_sizes(1, 2);
        let index = DataIndex::load_from_files(&config).unwrap();

        // Duplicate user 2 dropped; the 300 interaction predates item 30;
        // user 3 and item 99 don't exist
        assert_eq!(index.counts(), (2, 3, 5));
        assert_eq!(index.max_ids(), (2, 30));

        let user = index.get_user(1).unwrap();
        let items: Vec<u32> = user.interested_items().iter().copied().collect();
        assert_eq!(items, vec![10, 20]);
        assert_eq!(
            index
                .get_item(30)
                .unwrap()
                .interactions()
                .record_count(InteractionType::Click),
            1
        );
    }

    #[test]
    fn test_load_sorts_interactions_latest_first() {
        let dir = TempDir::new().unwrap();
        write_dataset(dir.path());

        let config = LoadConfig::new(dir.path()).with_threads(4).with_batch_sizes(1, 1);
        let index = DataIndex::load_from_files(&config).unwrap();

        let times = |records: Vec<Arc<InteractionRecord>>| -> Vec<i64> {
            records.iter().map(|r| r.timestamp).collect()
        };
        let user = index.get_user(1).unwrap();
        assert_eq!(times(user.interactions().records_with(InteractionType::Click, 20)), vec![400, 200]);
        let item = index.get_item(20).unwrap();
        assert_eq!(times(item.interactions().records_with(InteractionType::Click, 1)), vec![400, 200]);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = DataIndex::load_from_files(&LoadConfig::new(dir.path())).unwrap_err();
        assert!(matches!(err, DataLoadError::FileNotFound { .. }));
    }

    #[test]
    fn test_empty_file_has_no_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.csv");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            open_data_file(&path),
            Err(DataLoadError::MissingHeader { .. })
        ));
    }

    #[test]
    fn test_invalid_type_aborts_load() {
        let dir = TempDir::new().unwrap();
        write_dataset(dir.path());
        fs::write(
            dir.path().join("interactions_train.csv"),
            "header\n1\t10\t1\t200\n1\t20\t7\t200\n",
        )
        .unwrap();

        let err = DataIndex::load_from_files(&LoadConfig::new(dir.path()).with_threads(2)).unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidInteractionType { code: 7, line: 3 }));
    }

    #[test]
    fn test_line_numbers_follow_file_order() {
        let text = (1..=50).map(|n| n.to_string()).collect::<Vec<_>>().join("\n");
        let seen = Mutex::new(Vec::new());

        let count = load_lines_parallel(Cursor::new(text).lines(), 1, 4, 3, |line, no| {
            assert_eq!(line.parse::<usize>().unwrap(), no);
            seen.lock().unwrap().push(no);
            Ok(())
        })
        .unwrap();

        assert_eq!(count, 50);
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn test_duplicate_ids_keep_first_row() {
        let dir = TempDir::new().unwrap();
        write_dataset(dir.path());
        let config = LoadConfig::new(dir.path()).with_threads(1);
        let index = DataIndex::load_from_files(&config).unwrap();
        let user = index.get_user(2).unwrap();
        assert_eq!(user.id(), 2);
        assert!(user.profile.job_roles.contains(&3));
    }
}
