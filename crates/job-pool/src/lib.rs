//! # Job Pool Crate
//!
//! A fixed-size pool of OS threads, each draining its own FIFO queue.
//!
//! ## How it works
//!
//! ```text
//! submit(job) ──random──▶ queue[0] ──▶ worker 0
//!                         queue[1] ──▶ worker 1
//!                         ...
//!                         queue[n] ──▶ worker n
//! ```
//!
//! A submitted job lands on one queue picked uniformly at random. Workers
//! block on their queue's condition variable while it is empty. Shutdown
//! pushes one `Terminate` message per queue behind any pending jobs, so
//! every job submitted before `terminate()` still runs, then joins the
//! workers.
//!
//! Jobs are not isolated from each other: a panicking job takes its worker
//! down, and whatever was still queued for that worker is lost. The panic
//! surfaces as [`JobPoolError::WorkerPanicked`] from `terminate()`.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, error};

/// A unit of work for the pool
pub type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Error, Debug)]
pub enum JobPoolError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Job pool has been terminated")]
    Terminated,

    #[error("Worker {worker} panicked while running a job")]
    WorkerPanicked { worker: usize },
}

pub type Result<T> = std::result::Result<T, JobPoolError>;

enum Message {
    Run(Job),
    Terminate,
}

/// Blocking FIFO queue owned by one worker
#[derive(Default)]
struct JobQueue {
    messages: Mutex<VecDeque<Message>>,
    available: Condvar,
}

impl JobQueue {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, message: Message) {
        self.lock().push_back(message);
        self.available.notify_one();
    }

    /// Pop the next message, waiting while the queue is empty
    fn pop(&self) -> Message {
        let mut messages = self.lock();
        loop {
            if let Some(message) = messages.pop_front() {
                return message;
            }
            messages = self
                .available
                .wait(messages)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

fn worker_loop(id: usize, queue: Arc<JobQueue>) {
    let mut executed = 0usize;
    loop {
        match queue.pop() {
            Message::Run(job) => {
                job();
                executed += 1;
            }
            Message::Terminate => break,
        }
    }
    debug!(worker = id, executed, "worker exiting");
}

/// Worker pool with one blocking queue per thread.
pub struct JobPool {
    queues: Vec<Arc<JobQueue>>,
    workers: Vec<JoinHandle<()>>,
    terminated: bool,
}

impl JobPool {
    /// Start a pool of `size` workers (at least one)
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let mut pool = Self {
            queues: Vec::with_capacity(size),
            workers: Vec::with_capacity(size),
            terminated: false,
        };

        for id in 0..size {
            let queue = Arc::new(JobQueue::default());
            let worker_queue = Arc::clone(&queue);
            // On failure the partially built pool is dropped, which shuts
            // down the workers already started
            let handle = thread::Builder::new()
                .name(format!("job-pool-{}", id))
                .spawn(move || worker_loop(id, worker_queue))?;
            pool.queues.push(queue);
            pool.workers.push(handle);
        }

        debug!(size, "job pool started");
        Ok(pool)
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting in the queues, not counting ones being executed
    pub fn pending(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Queue `job` on a randomly chosen worker
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.terminated {
            return Err(JobPoolError::Terminated);
        }
        let slot = rand::rng().random_range(0..self.queues.len());
        self.queues[slot].push(Message::Run(Box::new(job)));
        Ok(())
    }

    /// Let every queued job finish, then stop and join all workers.
    ///
    /// Calling it again is a no-op.
    pub fn terminate(&mut self) -> Result<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        for queue in &self.queues[..self.workers.len()] {
            queue.push(Message::Terminate);
        }

        let mut first_panic = None;
        for (id, handle) in self.workers.drain(..).enumerate() {
            if handle.join().is_err() {
                error!(worker = id, "job pool worker panicked");
                first_panic.get_or_insert(JobPoolError::WorkerPanicked { worker: id });
            }
        }

        debug!("job pool terminated");
        match first_panic {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl Drop for JobPool {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            error!("job pool shut down with error: {}", e);
        }
    }
}

impl std::fmt::Debug for JobPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPool")
            .field("size", &self.workers.len())
            .field("terminated", &self.terminated)
            .finish()
    }
}
