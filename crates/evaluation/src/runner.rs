//! # Batch Evaluator
//!
//! Runs one recommendation query per ground-truth user and scores it:
//! 1. Resolve the user in the data index
//! 2. Ask the recommender for the top `RECALL_SIZE` items
//! 3. Score the list against the user's relevant items
//! 4. Add the score to the total and append a report row
//!
//! Queries are independent. They are dispatched either to a fixed group of
//! threads pulling users from a shared cursor, or to a [`JobPool`] with one
//! job per user. Users missing from the index and users that get an empty
//! list are logged and left out of the report.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use data_loader::{DataIndex, ItemId, UserId, default_threads};
use job_pool::JobPool;
use recommender::{Algorithm, Recommender, build_recommender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{EvaluationError, Result};
use crate::ground_truth::GroundTruth;
use crate::report::ReportWriter;
use crate::scoring::{RECALL_SIZE, score_user};

// =============================================================================
// Configuration
// =============================================================================

/// How queries are spread over threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dispatch {
    /// Fixed threads pulling users from a shared cursor
    ThreadGroup,
    /// One job per user on a job pool
    JobPool,
}

impl FromStr for Dispatch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "threadgroup" | "threads" => Ok(Dispatch::ThreadGroup),
            "jobpool" | "pool" => Ok(Dispatch::JobPool),
            other => Err(format!("unknown dispatch mode '{}' (expected thread-group or job-pool)", other)),
        }
    }
}

impl std::fmt::Display for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatch::ThreadGroup => write!(f, "thread-group"),
            Dispatch::JobPool => write!(f, "job-pool"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub algorithm: Algorithm,
    /// Neighbour users (UserCF) or similar-item list capacity (ItemCF)
    pub k: usize,
    /// Items requested per user
    pub n_items: usize,
    pub threads: usize,
    pub dispatch: Dispatch,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::UserCf,
            k: 20,
            n_items: RECALL_SIZE,
            threads: default_threads(),
            dispatch: Dispatch::ThreadGroup,
        }
    }
}

impl EvaluationConfig {
    pub fn new(algorithm: Algorithm, k: usize) -> Self {
        Self {
            algorithm,
            k,
            ..Default::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_n_items(mut self, n_items: usize) -> Self {
        self.n_items = n_items;
        self
    }
}

// =============================================================================
// Summary
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSummary {
    /// Users in the ground truth
    pub users: usize,
    /// Users that got a non-empty list and were scored
    pub evaluated: usize,
    pub missing_users: usize,
    pub empty_results: usize,
    pub total_score: f64,
    pub elapsed: Duration,
}

impl EvaluationSummary {
    pub fn mean_score(&self) -> f64 {
        if self.evaluated == 0 {
            0.0
        } else {
            self.total_score / self.evaluated as f64
        }
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// State shared by every query of one run
struct RunState<W: Write> {
    data_index: Arc<DataIndex>,
    recommender: Arc<dyn Recommender>,
    k: usize,
    n_items: usize,
    report: Mutex<ReportWriter<W>>,
    total_score: Mutex<f64>,
    evaluated: AtomicUsize,
    missing_users: AtomicUsize,
    empty_results: AtomicUsize,
    first_error: Mutex<Option<EvaluationError>>,
}

impl<W: Write> RunState<W> {
    fn failed(&self) -> bool {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn record_error(&self, error: EvaluationError) {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(error);
    }

    fn evaluate_user(&self, user_id: UserId, relevant: &BTreeSet<ItemId>) {
        if let Err(e) = self.try_evaluate_user(user_id, relevant) {
            self.record_error(e);
        }
    }

    fn try_evaluate_user(&self, user_id: UserId, relevant: &BTreeSet<ItemId>) -> Result<()> {
        let Some(user) = self.data_index.get_user(user_id) else {
            info!("No user {} found in user database", user_id);
            self.missing_users.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };

        let recommendations = self
            .recommender
            .recommend(&user, self.k, self.n_items)
            .map_err(|e| EvaluationError::Recommendation {
                user: user_id,
                message: format!("{:#}", e),
            })?;
        if recommendations.is_empty() {
            info!("No item recommended to user {}", user_id);
            self.empty_results.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let ids: Vec<ItemId> = recommendations.iter().map(|r| r.item_id).collect();
        let score = score_user(user_id, &ids, relevant);

        *self.total_score.lock().unwrap_or_else(PoisonError::into_inner) += score.score;
        self.evaluated.fetch_add(1, Ordering::Relaxed);

        self.report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_row(&score, &recommendations)
    }
}

/// Scores a recommender against held-out interactions
pub struct BatchEvaluator {
    data_index: Arc<DataIndex>,
    recommender: Arc<dyn Recommender>,
    config: EvaluationConfig,
}

impl BatchEvaluator {
    pub fn new(data_index: Arc<DataIndex>, config: EvaluationConfig) -> Self {
        let recommender = build_recommender(config.algorithm, Arc::clone(&data_index), config.threads);
        Self {
            data_index,
            recommender,
            config,
        }
    }

    /// Evaluate a specific recommender instead of one built from the config
    pub fn with_recommender(mut self, recommender: Arc<dyn Recommender>) -> Self {
        self.recommender = recommender;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Run the evaluation and write the report to `path`
    pub fn run_to_file(&self, truth: Arc<GroundTruth>, path: &Path) -> Result<EvaluationSummary> {
        let file = File::create(path)?;
        self.run(truth, BufWriter::new(file))
    }

    /// Run the evaluation, writing report rows to `out` as users complete
    #[instrument(skip_all, fields(
        algorithm = %self.recommender.algorithm(),
        k = self.config.k,
        dispatch = %self.config.dispatch
    ))]
    pub fn run<W>(&self, truth: Arc<GroundTruth>, out: W) -> Result<EvaluationSummary>
    where
        W: Write + Send + 'static,
    {
        let start = Instant::now();
        let state = Arc::new(RunState {
            data_index: Arc::clone(&self.data_index),
            recommender: Arc::clone(&self.recommender),
            k: self.config.k,
            n_items: self.config.n_items,
            report: Mutex::new(ReportWriter::new(out)?),
            total_score: Mutex::new(0.0),
            evaluated: AtomicUsize::new(0),
            missing_users: AtomicUsize::new(0),
            empty_results: AtomicUsize::new(0),
            first_error: Mutex::new(None),
        });

        info!("Evaluating {} users", truth.len());
        match self.config.dispatch {
            Dispatch::ThreadGroup => self.run_thread_group(&state, &truth)?,
            Dispatch::JobPool => self.run_job_pool(&state, &truth)?,
        }

        if let Some(e) = state
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(e);
        }
        state
            .report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;

        let summary = EvaluationSummary {
            users: truth.len(),
            evaluated: state.evaluated.load(Ordering::Relaxed),
            missing_users: state.missing_users.load(Ordering::Relaxed),
            empty_results: state.empty_results.load(Ordering::Relaxed),
            total_score: *state.total_score.lock().unwrap_or_else(PoisonError::into_inner),
            elapsed: start.elapsed(),
        };
        info!(
            evaluated = summary.evaluated,
            missing = summary.missing_users,
            empty = summary.empty_results,
            total_score = summary.total_score,
            elapsed = ?summary.elapsed,
            "evaluation finished"
        );
        Ok(summary)
    }

    fn run_thread_group<W: Write + Send>(&self, state: &RunState<W>, truth: &GroundTruth) -> Result<()> {
        let cursor = Mutex::new(truth.iter());
        let cursor = &cursor;

        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.config.threads.max(1))
                .map(move |_| {
                    scope.spawn(move || {
                        loop {
                            if state.failed() {
                                return;
                            }
                            let next = cursor.lock().unwrap_or_else(PoisonError::into_inner).next();
                            let Some((&user_id, relevant)) = next else {
                                return;
                            };
                            state.evaluate_user(user_id, relevant);
                        }
                    })
                })
                .collect();

            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            if panicked {
                Err(EvaluationError::WorkerPanicked)
            } else {
                Ok(())
            }
        })
    }

    fn run_job_pool<W: Write + Send + 'static>(
        &self,
        state: &Arc<RunState<W>>,
        truth: &Arc<GroundTruth>,
    ) -> Result<()> {
        let mut pool = JobPool::new(self.config.threads)?;
        for user_id in truth.user_ids() {
            let state = Arc::clone(state);
            let truth = Arc::clone(truth);
            pool.submit(move || {
                if state.failed() {
                    return;
                }
                if let Some(relevant) = truth.relevant(user_id) {
                    state.evaluate_user(user_id, relevant);
                }
            })?;
        }
        pool.terminate()?;
        debug!("evaluation job pool drained");
        Ok(())
    }
}

impl std::fmt::Debug for BatchEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEvaluator")
            .field("algorithm", &self.recommender.algorithm())
            .field("config", &self.config)
            .finish()
    }
}
