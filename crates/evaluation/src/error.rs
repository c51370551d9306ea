//! Error types for the evaluation harness

use data_loader::{DataLoadError, UserId};
use job_pool::JobPoolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Failed to load ground truth: {0}")]
    Load(#[from] DataLoadError),

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job pool error: {0}")]
    JobPool(#[from] JobPoolError),

    #[error("Recommendation failed for user {user}: {message}")]
    Recommendation { user: UserId, message: String },

    #[error("An evaluation worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, EvaluationError>;
