//! Workflow coordinator
//!
//! Deduplicates expensive workflow operations (CI runs, test executions)
//! across concurrent requesters. At most one execution per dedupe key is in
//! flight at a time; every requester of that key receives the same result.
//! Results stay cached until explicitly invalidated. A failed execution is
//! delivered as a failed result to every waiter; retrying is the caller's
//! decision.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Kind of workflow operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Run the CI pipeline
    RunCi,
    /// Fetch latest test results
    GetTestResults,
    /// Run one specific test
    RunSpecificTest,
}

impl WorkflowKind {
    /// String form used in dedupe keys
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunCi => "run_ci",
            Self::GetTestResults => "get_test_results",
            Self::RunSpecificTest => "run_specific_test",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One workflow operation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOperation {
    /// Kind
    pub kind: WorkflowKind,
    /// Ref the operation targets
    pub target_ref: String,
    /// Kind-specific arguments (e.g. the test name)
    #[serde(default)]
    pub args: serde_json::Value,
}

impl WorkflowOperation {
    /// Create an operation
    #[must_use]
    pub fn new(kind: WorkflowKind, target_ref: impl Into<String>) -> Self {
        Self {
            kind,
            target_ref: target_ref.into(),
            args: serde_json::Value::Null,
        }
    }

    /// Attach arguments
    #[must_use]
    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    /// Deduplication key. Operations with the same key share one execution.
    #[must_use]
    pub fn dedupe_key(&self) -> String {
        match self.args.as_str() {
            Some(arg) => format!("{}:{}:{arg}", self.kind, self.target_ref),
            None => format!("{}:{}", self.kind, self.target_ref),
        }
    }
}

/// Result of a workflow operation, shared by all requesters of its key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Key the result belongs to
    pub dedupe_key: String,
    /// Whether the operation succeeded
    pub success: bool,
    /// Operation output
    pub output: serde_json::Value,
    /// Error detail when it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the execution finished
    pub finished_at: DateTime<Utc>,
}

/// Backend that actually executes workflow operations
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    /// Execute one operation
    async fn execute(&self, operation: &WorkflowOperation) -> Result<serde_json::Value>;
}

enum KeyState {
    InFlight(broadcast::Sender<WorkflowResult>),
    Done(WorkflowResult),
}

struct CoordinatorInner {
    backend: Arc<dyn WorkflowBackend>,
    keys: Mutex<HashMap<String, KeyState>>,
    executions: AtomicU64,
}

impl CoordinatorInner {
    async fn execute(
        self: Arc<Self>,
        operation: WorkflowOperation,
        key: String,
        sender: broadcast::Sender<WorkflowResult>,
    ) {
        self.executions.fetch_add(1, Ordering::SeqCst);
        info!(dedupe_key = %key, kind = %operation.kind, "Executing workflow operation");

        let result = match self.backend.execute(&operation).await {
            Ok(output) => WorkflowResult {
                dedupe_key: key.clone(),
                success: true,
                output,
                error: None,
                finished_at: Utc::now(),
            },
            Err(e) => {
                warn!(dedupe_key = %key, error = %e, "Workflow operation failed");
                WorkflowResult {
                    dedupe_key: key.clone(),
                    success: false,
                    output: serde_json::Value::Null,
                    error: Some(e.to_string()),
                    finished_at: Utc::now(),
                }
            }
        };

        let mut keys = self.keys.lock().await;
        keys.insert(key, KeyState::Done(result.clone()));
        // Waiters may all have gone away; a send error is fine
        let _ = sender.send(result);
    }
}

/// Single-flight coordinator over a workflow backend
pub struct WorkflowCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl WorkflowCoordinator {
    /// Create a coordinator over a backend
    #[must_use]
    pub fn new(backend: Arc<dyn WorkflowBackend>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                backend,
                keys: Mutex::new(HashMap::new()),
                executions: AtomicU64::new(0),
            }),
        }
    }

    /// Submit an operation. The first requester of a key starts its
    /// execution; later requesters of the same key wait for that execution's
    /// result. The execution runs in its own task, so it publishes its result
    /// even when the submitting future is dropped mid-flight.
    pub async fn submit(&self, operation: WorkflowOperation) -> Result<WorkflowResult> {
        let key = operation.dedupe_key();

        let mut receiver = {
            let mut keys = self.inner.keys.lock().await;
            match keys.get(&key) {
                Some(KeyState::Done(result)) => {
                    debug!(dedupe_key = %key, "Workflow result served from cache");
                    return Ok(result.clone());
                }
                Some(KeyState::InFlight(sender)) => {
                    debug!(dedupe_key = %key, "Joining in-flight workflow operation");
                    sender.subscribe()
                }
                None => {
                    let (sender, receiver) = broadcast::channel(8);
                    keys.insert(key.clone(), KeyState::InFlight(sender.clone()));
                    tokio::spawn(Arc::clone(&self.inner).execute(operation, key, sender));
                    receiver
                }
            }
        };

        receiver
            .recv()
            .await
            .map_err(|e| Error::Workflow(format!("in-flight operation dropped: {e}")))
    }

    /// Drop the cached result for a key so the next submit re-executes.
    /// An in-flight execution is left alone.
    pub async fn invalidate(&self, key: &str) {
        let mut keys = self.inner.keys.lock().await;
        if matches!(keys.get(key), Some(KeyState::Done(_))) {
            keys.remove(key);
            debug!(dedupe_key = %key, "Workflow result invalidated");
        }
    }

    /// Number of backend executions performed
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.inner.executions.load(Ordering::SeqCst)
    }
}
