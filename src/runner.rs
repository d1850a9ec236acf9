//! Bounded concurrent task runner with progress accounting
//!
//! [`TaskRunner::run`] spawns one task per input item onto the tokio runtime,
//! lets at most `max_workers` of them run at once and collects their results
//! in completion order. A failing or panicking task is recorded in the
//! [`RunReport`] and never affects its siblings.

use log::{info, warn};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Monotonic completed-task counter shared between workers
#[derive(Debug)]
pub struct Progress {
    done: AtomicUsize,
    total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
        }
    }

    /// Record one finished task and return the new snapshot.
    pub fn advance(&self) -> ProgressSnapshot {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        ProgressSnapshot {
            done,
            total: self.total,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            done: self.done.load(Ordering::SeqCst),
            total: self.total,
        }
    }
}

/// Point-in-time view of a [`Progress`] counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub done: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    /// Completion percentage; an empty run is complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.done == self.total
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}, {:.1}%", self.done, self.total, self.percent())
    }
}

/// Why a task contributed no result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure<E> {
    /// The task returned an error
    Failed { item: String, error: E },
    /// The task panicked or was cancelled by the runtime
    Aborted { message: String },
}

impl<E: fmt::Display> fmt::Display for TaskFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Failed { item, error } => write!(f, "{}: {}", item, error),
            TaskFailure::Aborted { message } => write!(f, "task aborted: {}", message),
        }
    }
}

/// Outcome of a whole run
#[derive(Debug)]
pub struct RunReport<T, E> {
    /// Successful results, in completion order
    pub completed: Vec<T>,
    pub failures: Vec<TaskFailure<E>>,
    pub progress: ProgressSnapshot,
}

/// Runs independent per-item tasks with bounded parallelism
#[derive(Debug, Clone)]
pub struct TaskRunner {
    max_workers: usize,
    verb: &'static str,
}

impl TaskRunner {
    /// `verb` prefixes progress log lines, e.g. `Scraped` or `Downloaded`.
    pub fn new(max_workers: usize, verb: &'static str) -> Self {
        Self {
            max_workers: max_workers.max(1),
            verb,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub async fn run<I, T, E, F, Fut>(&self, items: Vec<I>, task: F) -> RunReport<T, E>
    where
        I: fmt::Display + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let progress = Progress::new(items.len());
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let task = Arc::new(task);
        let mut set = JoinSet::new();

        for item in items {
            let semaphore = Arc::clone(&semaphore);
            let task = Arc::clone(&task);
            set.spawn(async move {
                // The semaphore is never closed, so acquiring cannot fail
                let _permit = semaphore.acquire_owned().await.ok();
                let label = item.to_string();
                (label, task(item).await)
            });
        }

        let mut completed = Vec::new();
        let mut failures = Vec::new();

        while let Some(joined) = set.join_next().await {
            let snapshot = progress.advance();
            match joined {
                Ok((label, Ok(value))) => {
                    info!("{} {} ({})", self.verb, label, snapshot);
                    completed.push(value);
                }
                Ok((label, Err(error))) => {
                    warn!("{} failed ({}): {}", label, snapshot, error);
                    failures.push(TaskFailure::Failed { item: label, error });
                }
                Err(e) => {
                    warn!("Task aborted ({}): {}", snapshot, e);
                    failures.push(TaskFailure::Aborted {
                        message: e.to_string(),
                    });
                }
            }
        }

        RunReport {
            completed,
            failures,
            progress: progress.snapshot(),
        }
    }
}
