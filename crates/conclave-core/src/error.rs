//! Error types for conclave-core
//!
//! Failure taxonomy of the engine. Two classes of failure are deliberately
//! NOT errors: a failed retrieval becomes an empty context finding, and an
//! exhausted iteration budget is a normal terminal transition. Only the
//! failures that must stop or redirect the session surface here.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Shared workflow operation failed; delivered to every subscriber
    #[error("workflow operation failed: {0}")]
    Workflow(String),

    /// Memory store write failed after all retries; fatal to the round
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Memory store read failed (callers degrade to empty prior knowledge)
    #[error("memory error: {0}")]
    Memory(String),

    /// Retrieval capability error
    #[error("retrieval error: {0}")]
    Retrieval(#[from] conclave_retrieval::Error),

    /// Session was cancelled externally
    #[error("session cancelled")]
    Cancelled,

    /// Internal error (serialization, task join, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
