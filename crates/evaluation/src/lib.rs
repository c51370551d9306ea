//! # Evaluation Crate
//!
//! Offline scoring of the recommenders against held-out interactions.
//!
//! ## Components
//!
//! - **ground_truth**: Relevant items per user, read from the test file
//! - **scoring**: Precision/recall based per-user score
//! - **report**: Tab-separated per-user report
//! - **runner**: `BatchEvaluator`, running one query per user in parallel
//!
//! ## Example Usage
//!
//! ```ignore
//! use evaluation::{BatchEvaluator, EvaluationConfig, GroundTruth};
//! use recommender::Algorithm;
//!
//! let truth = Arc::new(GroundTruth::load(&config.test_interactions_path())?);
//! let evaluator = BatchEvaluator::new(data_index, EvaluationConfig::new(Algorithm::UserCf, 20));
//! let summary = evaluator.run_to_file(truth, Path::new("rcmd_result.txt"))?;
//! println!("Total score: {}", summary.total_score);
//! ```

pub mod error;
pub mod ground_truth;
pub mod report;
pub mod runner;
pub mod scoring;

pub use error::{EvaluationError, Result};
pub use ground_truth::GroundTruth;
pub use report::{REPORT_HEADER, ReportWriter};
pub use runner::{BatchEvaluator, Dispatch, EvaluationConfig, EvaluationSummary};
pub use scoring::{RECALL_SIZE, UserScore, score_user};
