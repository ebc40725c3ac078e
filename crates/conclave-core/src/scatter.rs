//! Scatter/gather for parallel agent work
//!
//! Tasks are spawned with a per-task wall-clock budget and gathered with an
//! all-must-finish barrier. The barrier always terminates: a task that runs
//! past its budget is reported as timed out, a panicked task as failed, and
//! the rest complete normally.

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::warn;

/// Outcome of one scattered task
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// The task finished within its budget
    Completed(T),
    /// The task ran past its budget and was abandoned
    TimedOut,
    /// The task panicked or was aborted
    Failed(String),
}

impl<T> TaskOutcome<T> {
    /// The completed value, if any
    pub fn into_completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// A batch of labeled tasks running under individual budgets
pub struct ScatterBatch<L, T> {
    handles: Vec<(L, JoinHandle<Option<T>>)>,
}

impl<L, T> ScatterBatch<L, T>
where
    T: Send + 'static,
{
    /// Create an empty batch
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Spawn a task with a label and a wall-clock budget
    pub fn spawn<F>(&mut self, label: L, budget: Duration, future: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let handle = tokio::spawn(async move { timeout(budget, future).await.ok() });
        self.handles.push((label, handle));
    }

    /// Number of tasks in the batch
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the batch is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every task to finish. Returns one outcome per task, in
    /// spawn order.
    pub async fn gather(self) -> Vec<(L, TaskOutcome<T>)> {
        let (labels, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();
        let results = join_all(handles).await;
        labels
            .into_iter()
            .zip(results)
            .map(|(label, result)| {
                let outcome = match result {
                    Ok(Some(value)) => TaskOutcome::Completed(value),
                    Ok(None) => TaskOutcome::TimedOut,
                    Err(e) => {
                        warn!(error = %e, "Scattered task failed");
                        TaskOutcome::Failed(e.to_string())
                    }
                };
                (label, outcome)
            })
            .collect()
    }
}

impl<L, T> Default for ScatterBatch<L, T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
