//! Context workers
//!
//! A context worker serves exactly one retrieval request: cache hit returns
//! the stored finding with no external call; cache miss performs one
//! retrieval, optionally summarizes it, and writes the result to the cache.
//! A failed retrieval still produces a finding, with an empty payload and
//! the failure reason, so specialists always get an answer.

use crate::cache::{ContextFinding, FindingCache};
use crate::error::Result;
use async_trait::async_trait;
use conclave_retrieval::{RetrievalTask, RetrieverRegistry};
use std::sync::Arc;
use tracing::{debug, warn};

/// Summarizes raw retrieval payloads for reviewer consumption
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a short summary of the payload
    async fn summarize(&self, task: &RetrievalTask, payload: &serde_json::Value)
        -> Result<String>;
}

/// Outcome of serving one context request
#[derive(Debug, Clone)]
pub struct ContextOutcome {
    /// The finding, from cache or freshly retrieved
    pub finding: Arc<ContextFinding>,
    /// Whether it was served from cache
    pub cache_hit: bool,
}

/// Worker that resolves context requests against the cache and retrievers
pub struct ContextWorker {
    retrievers: Arc<RetrieverRegistry>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl ContextWorker {
    /// Create a worker over a retriever registry
    #[must_use]
    pub fn new(retrievers: Arc<RetrieverRegistry>) -> Self {
        Self {
            retrievers,
            summarizer: None,
        }
    }

    /// Attach a summarizer
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Serve one request. At most one external retrieval happens per cache
    /// key per session; concurrent workers racing on the same key both get
    /// the first writer's finding.
    pub async fn run(&self, task: &RetrievalTask, cache: &FindingCache) -> ContextOutcome {
        let key = task.cache_key();

        if let Some(finding) = cache.get(&key) {
            debug!(cache_key = %key, "Context served from cache");
            return ContextOutcome {
                finding,
                cache_hit: true,
            };
        }

        let finding = self.retrieve(task, &key).await;
        let stored = cache.insert_if_absent(finding);
        ContextOutcome {
            finding: stored,
            cache_hit: false,
        }
    }

    async fn retrieve(&self, task: &RetrievalTask, key: &str) -> ContextFinding {
        let retriever = match self.retrievers.get(task.kind) {
            Ok(r) => r,
            Err(e) => {
                warn!(kind = %task.kind, "No retriever registered");
                return ContextFinding::failure(key, task.kind, e.to_string());
            }
        };

        let output = match retriever.retrieve(task).await {
            Ok(output) => output,
            Err(e) => {
                warn!(kind = %task.kind, error = %e, "Retrieval failed");
                return ContextFinding::failure(key, task.kind, e.to_string());
            }
        };

        if !output.success {
            let reason = output
                .payload
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("retrieval reported failure")
                .to_string();
            return ContextFinding::failure(key, task.kind, reason).with_cost(output.cost_usd);
        }

        let summary = match &self.summarizer {
            Some(summarizer) => match summarizer.summarize(task, &output.payload).await {
                Ok(summary) => summary,
                // Summarization is best-effort; fall back to the raw query
                Err(e) => {
                    debug!(error = %e, "Summarization failed, using query as summary");
                    format!("{} results for '{}'", task.kind, task.query)
                }
            },
            None => format!("{} results for '{}'", task.kind, task.query),
        };

        ContextFinding::success(key, task.kind, summary, output.payload)
            .with_cost(output.cost_usd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_retrieval::{
        RetrievalKind, RetrievalOutput, Retriever, RetrieverDefinition,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingRetriever {
        definition: RetrieverDefinition,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Retriever for CountingRetriever {
        fn definition(&self) -> &RetrieverDefinition {
            &self.definition
        }

        async fn retrieve(
            &self,
            _task: &RetrievalTask,
        ) -> conclave_retrieval::Result<RetrievalOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RetrievalOutput::success(
                serde_json::json!({"matches": []}),
                5,
            ))
        }
    }

    fn counting_registry(calls: Arc<AtomicU32>) -> Arc<RetrieverRegistry> {
        let mut registry = RetrieverRegistry::new();
        registry.register(Arc::new(CountingRetriever {
            definition: RetrieverDefinition::new(RetrievalKind::TextSearch, "counting"),
            calls,
        }));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_cache_hit_skips_retrieval() {
        let calls = Arc::new(AtomicU32::new(0));
        let worker = ContextWorker::new(counting_registry(calls.clone()));
        let cache = FindingCache::new();
        let task = RetrievalTask::new(RetrievalKind::TextSearch, vec!["a.rs".into()], "query");

        let first = worker.run(&task, &cache).await;
        assert!(!first.cache_hit);
        let second = worker.run(&task, &cache).await;
        assert!(second.cache_hit);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.finding.cache_key, second.finding.cache_key);
    }

    #[tokio::test]
    async fn test_missing_retriever_yields_empty_finding() {
        let worker = ContextWorker::new(Arc::new(RetrieverRegistry::new()));
        let cache = FindingCache::new();
        let task = RetrievalTask::new(RetrievalKind::SymbolLookup, vec![], "Foo::bar");

        let outcome = worker.run(&task, &cache).await;
        assert!(!outcome.finding.success);
        assert!(outcome.finding.failure_reason.is_some());
        // The failure is cached too
        assert!(cache.get(&task.cache_key()).is_some());
    }

    struct FixedSummarizer;

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(
            &self,
            _task: &RetrievalTask,
            _payload: &serde_json::Value,
        ) -> Result<String> {
            Ok("three matches, all in tests".to_string())
        }
    }

    #[tokio::test]
    async fn test_summarizer_output_is_used() {
        let calls = Arc::new(AtomicU32::new(0));
        let worker =
            ContextWorker::new(counting_registry(calls)).with_summarizer(Arc::new(FixedSummarizer));
        let cache = FindingCache::new();
        let task = RetrievalTask::new(RetrievalKind::TextSearch, vec![], "query");

        let outcome = worker.run(&task, &cache).await;
        assert_eq!(outcome.finding.summary, "three matches, all in tests");
    }
}
