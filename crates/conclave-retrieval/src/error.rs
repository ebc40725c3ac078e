//! Error types for conclave-retrieval

use thiserror::Error;

/// Retrieval error type
#[derive(Debug, Error)]
pub enum Error {
    /// No retriever registered for the requested kind
    #[error("no retriever for kind: {0}")]
    NotRegistered(String),

    /// Retrieval execution failed
    #[error("retrieval failed: {0}")]
    Execution(String),

    /// Invalid task input
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
