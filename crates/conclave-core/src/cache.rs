//! Session-scoped context cache
//!
//! Retrieved context is cached by deterministic key for the lifetime of a
//! session. Entries are write-once: the first writer wins and later writes
//! for the same key are ignored, so every reader of a key observes the same
//! finding.

use chrono::{DateTime, Utc};
use conclave_retrieval::RetrievalKind;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A unit of retrieved context, successful or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFinding {
    /// Cache key this finding is stored under
    pub cache_key: String,
    /// Kind of retrieval that produced it
    pub kind: RetrievalKind,
    /// Short summary of the content
    pub summary: String,
    /// Full payload
    pub payload: serde_json::Value,
    /// Cost attributed to producing this finding
    pub cost_usd: f64,
    /// Whether the retrieval succeeded
    pub success: bool,
    /// Failure reason when it did not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// When the finding was produced
    pub timestamp: DateTime<Utc>,
}

impl ContextFinding {
    /// Create a successful finding
    #[must_use]
    pub fn success(
        cache_key: impl Into<String>,
        kind: RetrievalKind,
        summary: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            cache_key: cache_key.into(),
            kind,
            summary: summary.into(),
            payload,
            cost_usd: 0.0,
            success: true,
            failure_reason: None,
            timestamp: Utc::now(),
        }
    }

    /// Create an empty finding recording a failed retrieval
    #[must_use]
    pub fn failure(
        cache_key: impl Into<String>,
        kind: RetrievalKind,
        reason: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        Self {
            cache_key: cache_key.into(),
            kind,
            summary: format!("retrieval failed: {reason}"),
            payload: serde_json::Value::Null,
            cost_usd: 0.0,
            success: false,
            failure_reason: Some(reason),
            timestamp: Utc::now(),
        }
    }

    /// Attach a cost
    #[must_use]
    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }
}

/// Write-once cache of context findings, shared across all workers in a
/// session.
#[derive(Debug, Default)]
pub struct FindingCache {
    entries: DashMap<String, Arc<ContextFinding>>,
}

impl FindingCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a finding by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<ContextFinding>> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Insert a finding unless the key is already present.
    ///
    /// Returns the stored finding, which is the existing one when a
    /// concurrent writer got there first.
    pub fn insert_if_absent(&self, finding: ContextFinding) -> Arc<ContextFinding> {
        let key = finding.cache_key.clone();
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(finding));
        Arc::clone(entry.value())
    }

    /// Number of cached findings
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
