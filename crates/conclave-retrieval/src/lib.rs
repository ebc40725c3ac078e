//! Conclave Retrieval - Capability Interface and Built-in Retrievers
//!
//! This crate provides the retrieval boundary for the Conclave review engine:
//! - Registry: retrieval capability registration and lookup by kind
//! - Builtins: built-in retrievers (working-tree text search, git history)
//!
//! All retrieval kinds share one opaque call shape: `(scope, query)` in,
//! `(payload, cost, success)` out. The engine core treats them uniformly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod error;
pub mod registry;

pub use builtins::{register_builtins, GitHistoryRetriever, TextSearchRetriever};
pub use error::{Error, Result};
pub use registry::{
    RetrievalKind, RetrievalOutput, RetrievalTask, Retriever, RetrieverDefinition,
    RetrieverRegistry,
};
