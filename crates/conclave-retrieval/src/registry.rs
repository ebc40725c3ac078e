//! Registry - retrieval capability registration and lookup
//!
//! Retrievers are registered per [`RetrievalKind`] and invoked through one
//! uniform call shape. The review engine is agnostic to their transport:
//! a kind may be backed by a local index, an external search service, or a
//! plain subprocess.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Kind of retrieval a context worker may perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalKind {
    /// Full-text search over the working tree
    TextSearch,
    /// Symbol definitions/references lookup
    SymbolLookup,
    /// Commit history and blame for files
    HistoryLookup,
    /// Test coverage for files
    CoverageLookup,
}

impl RetrievalKind {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextSearch => "text_search",
            Self::SymbolLookup => "symbol_lookup",
            Self::HistoryLookup => "history_lookup",
            Self::CoverageLookup => "coverage_lookup",
        }
    }
}

impl std::fmt::Display for RetrievalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One retrieval task: what to fetch and where to look
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalTask {
    /// Retrieval kind
    pub kind: RetrievalKind,
    /// Target scope (typically file paths; may be empty)
    pub scope: Vec<String>,
    /// Free-text query (may be empty for scope-only kinds)
    pub query: String,
}

impl RetrievalTask {
    /// Create a new task
    #[must_use]
    pub fn new(kind: RetrievalKind, scope: Vec<String>, query: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            query: query.into(),
        }
    }

    /// Deterministic cache key: a pure function of (kind, scope, query).
    ///
    /// Scope order is normalized so logically identical tasks collide.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut scope = self.scope.clone();
        scope.sort();
        format!("{}:{}:{}", self.kind, scope.join(","), self.query)
    }
}

/// Result of one retrieval call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutput {
    /// Opaque result payload
    pub payload: serde_json::Value,
    /// Cost of the call in USD (0 for local retrievers)
    pub cost_usd: f64,
    /// Whether the retrieval succeeded
    pub success: bool,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl RetrievalOutput {
    /// Create a successful output
    #[must_use]
    pub fn success(payload: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            payload,
            cost_usd: 0.0,
            success: true,
            duration_ms,
        }
    }

    /// Create a failed output carrying the reason in the payload
    #[must_use]
    pub fn failure(reason: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            payload: serde_json::json!({ "error": reason.into() }),
            cost_usd: 0.0,
            success: false,
            duration_ms,
        }
    }

    /// Set the cost
    #[must_use]
    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }
}

/// Retriever metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverDefinition {
    /// Kind this retriever serves
    pub kind: RetrievalKind,
    /// Human-readable description
    pub description: String,
    /// Whether the retriever is enabled
    pub enabled: bool,
}

impl RetrieverDefinition {
    /// Create a new definition
    #[must_use]
    pub fn new(kind: RetrievalKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            enabled: true,
        }
    }
}

/// A retrieval capability
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retriever metadata
    fn definition(&self) -> &RetrieverDefinition;

    /// Execute one retrieval task
    async fn retrieve(&self, task: &RetrievalTask) -> Result<RetrievalOutput>;
}

/// Registry mapping retrieval kinds to capabilities
#[derive(Default)]
pub struct RetrieverRegistry {
    retrievers: HashMap<RetrievalKind, Arc<dyn Retriever>>,
}

impl RetrieverRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a retriever for its declared kind, replacing any existing one
    pub fn register(&mut self, retriever: Arc<dyn Retriever>) {
        let kind = retriever.definition().kind;
        debug!(kind = %kind, "Registering retriever");
        self.retrievers.insert(kind, retriever);
    }

    /// Look up the retriever for a kind
    pub fn get(&self, kind: RetrievalKind) -> Result<Arc<dyn Retriever>> {
        self.retrievers
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::NotRegistered(kind.to_string()))
    }

    /// Whether a kind is registered
    #[must_use]
    pub fn contains(&self, kind: RetrievalKind) -> bool {
        self.retrievers.contains_key(&kind)
    }

    /// List registered kinds
    #[must_use]
    pub fn kinds(&self) -> Vec<RetrievalKind> {
        self.retrievers.keys().copied().collect()
    }
}
