//! Integration tests for the batch evaluator.
//!
//! A small dataset is written to disk, loaded through the real loader and
//! evaluated with both dispatch modes and both algorithms.

use data_loader::{DataIndex, LoadConfig};
use evaluation::{BatchEvaluator, Dispatch, EvaluationConfig, GroundTruth, REPORT_HEADER};
use recommender::Algorithm;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_dataset(dir: &Path) {
    let mut users = String::from("id\tjobroles\n");
    for id in 1..=4 {
        users.push_str(&format!("{}\t1\t1\t0\t0\tde\t1\t1\t1\t1\t1\t\n", id));
    }
    fs::write(dir.join("users.csv"), users).unwrap();

    let mut items = String::from("id\ttitle\n");
    for id in [10, 20, 30, 40] {
        items.push_str(&format!("{}\t1\t1\t0\t0\tde\t1\t0\t0\t1\t1\t0\t1\n", id));
    }
    fs::write(dir.join("items.csv"), items).unwrap();

    fs::write(
        dir.join("interactions_train.csv"),
        "user_id\titem_id\tinteraction_type\tcreated_at\n\
         1\t10\t1\t5\n\
         1\t20\t1\t5\n\
         2\t20\t2\t5\n\
         2\t30\t1\t5\n\
         3\t10\t3\t5\n\
         3\t40\t1\t5\n",
    )
    .unwrap();

    // User 9 is unknown; user 4 has no history; user 2's only test row is a DELETE
    fs::write(
        dir.join("interactions_test.csv"),
        "user_id\titem_id\tinteraction_type\tcreated_at\n\
         1\t30\t1\t9\n\
         1\t40\t1\t9\n\
         2\t10\t4\t9\n\
         4\t10\t1\t9\n\
         9\t10\t1\t9\n",
    )
    .unwrap();
}

fn load(dir: &Path) -> (Arc<DataIndex>, Arc<GroundTruth>) {
    let config = LoadConfig::new(dir).with_threads(2).with_shard_count(8).with_log_shards(8);
    let index = DataIndex::load_from_files(&config).unwrap();
    let truth = GroundTruth::load(&config.test_interactions_path()).unwrap();
    (Arc::new(index), Arc::new(truth))
}

#[test]
fn test_evaluate_all_modes() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());
    let (data, truth) = load(dir.path());
    assert_eq!(truth.len(), 3);

    for algorithm in [Algorithm::UserCf, Algorithm::ItemCf] {
        for dispatch in [Dispatch::ThreadGroup, Dispatch::JobPool] {
            let config = EvaluationConfig::new(algorithm, 5)
                .with_threads(3)
                .with_dispatch(dispatch);
            let report_path = dir.path().join(format!("{}-{}.txt", algorithm, dispatch));
            let summary = BatchEvaluator::new(Arc::clone(&data), config)
                .run_to_file(Arc::clone(&truth), &report_path)
                .unwrap();

            assert_eq!(summary.users, 3);
            assert_eq!(summary.missing_users, 1);
            assert_eq!(summary.empty_results, 1);
            assert_eq!(summary.evaluated, 1);
            // User 1 is offered 30 and 40, both relevant
            assert!(summary.total_score > 40.0, "{} {}", algorithm, dispatch);

            let report = fs::read_to_string(&report_path).unwrap();
            let lines: Vec<&str> = report.lines().collect();
            assert_eq!(lines.len(), 2);
            assert_eq!(lines[0], REPORT_HEADER);
            assert!(lines[1].starts_with("1\t2\t"));
        }
    }
}

#[test]
fn test_empty_ground_truth() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());
    let (data, _) = load(dir.path());

    let summary = BatchEvaluator::new(data, EvaluationConfig::new(Algorithm::UserCf, 5).with_threads(2))
        .run_to_file(Arc::new(GroundTruth::new()), &dir.path().join("out.txt"))
        .unwrap();
    assert_eq!(summary.evaluated, 0);
    assert_eq!(summary.mean_score(), 0.0);
}
