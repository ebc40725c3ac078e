//! Durable session memory
//!
//! Round records are persisted before any downstream action depends on
//! them. Reads are best-effort (a failed read degrades to empty prior
//! knowledge); writes must be acknowledged, and the caller retries and
//! stalls the session when they are not.

use crate::error::{Error, Result};
use crate::session::RoundRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Prior knowledge about a target, loaded at session start
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorKnowledge {
    /// Rounds persisted by earlier sessions for the same target
    pub rounds: Vec<RoundRecord>,
}

impl PriorKnowledge {
    /// Whether anything is known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

/// Durable store for session round records
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Append a round record for a session. Returning `Ok` acknowledges
    /// that the record is durable.
    async fn append_round(&self, session_id: Uuid, record: &RoundRecord) -> Result<()>;

    /// Load prior knowledge for a target ref. Failures degrade to empty.
    async fn load_prior(&self, target_ref: &str) -> Result<PriorKnowledge>;
}

/// In-memory store, for tests and single-process runs
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Uuid, Vec<RoundRecord>>>,
    by_target: RwLock<HashMap<String, Vec<RoundRecord>>>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records persisted for a session
    pub async fn records(&self, session_id: Uuid) -> Vec<RoundRecord> {
        self.records
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Attribute persisted rounds to a target ref for later sessions
    pub async fn attribute(&self, target_ref: &str, record: RoundRecord) {
        self.by_target
            .write()
            .await
            .entry(target_ref.to_string())
            .or_default()
            .push(record);
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn append_round(&self, session_id: Uuid, record: &RoundRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let rounds = records.entry(session_id).or_default();
        // Resume after a stall may re-send the same record
        if rounds.iter().any(|r| r.round == record.round) {
            return Ok(());
        }
        rounds.push(record.clone());
        Ok(())
    }

    async fn load_prior(&self, target_ref: &str) -> Result<PriorKnowledge> {
        let by_target = self.by_target.read().await;
        Ok(PriorKnowledge {
            rounds: by_target.get(target_ref).cloned().unwrap_or_default(),
        })
    }
}

/// Wrapper that fails a configurable number of writes before succeeding.
/// Lives here rather than in test code so integration tests can share it.
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    failures_remaining: std::sync::atomic::AtomicU32,
}

impl<S> FlakyStore<S> {
    /// Wrap a store, failing the first `failures` writes
    #[must_use]
    pub fn new(inner: S, failures: u32) -> Self {
        Self {
            inner,
            failures_remaining: std::sync::atomic::AtomicU32::new(failures),
        }
    }

    /// The wrapped store
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: MemoryStore> MemoryStore for FlakyStore<S> {
    async fn append_round(&self, session_id: Uuid, record: &RoundRecord) -> Result<()> {
        use std::sync::atomic::Ordering;
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Persistence("simulated write failure".to_string()));
        }
        self.inner.append_round(session_id, record).await
    }

    async fn load_prior(&self, target_ref: &str) -> Result<PriorKnowledge> {
        self.inner.load_prior(target_ref).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Specialty;
    use crate::session::{RoundDecision, RoundMode};

    fn record(round: u32) -> RoundRecord {
        RoundRecord {
            round,
            mode: RoundMode::Review,
            roster: vec![Specialty::Alignment],
            reports: vec![],
            score: 0.0,
            decision: RoundDecision::Stop,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        store.append_round(id, &record(1)).await.unwrap();
        store.append_round(id, &record(2)).await.unwrap();
        assert_eq!(store.records(id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_resend_after_stall_is_idempotent() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        store.append_round(id, &record(1)).await.unwrap();
        store.append_round(id, &record(1)).await.unwrap();
        assert_eq!(store.records(id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_prior_knowledge_by_target() {
        let store = InMemoryStore::new();
        store.attribute("pr-42", record(1)).await;

        let prior = store.load_prior("pr-42").await.unwrap();
        assert_eq!(prior.rounds.len(), 1);
        let empty = store.load_prior("pr-99").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_flaky_store_recovers() {
        let store = FlakyStore::new(InMemoryStore::new(), 2);
        let id = Uuid::new_v4();
        assert!(store.append_round(id, &record(1)).await.is_err());
        assert!(store.append_round(id, &record(1)).await.is_err());
        assert!(store.append_round(id, &record(1)).await.is_ok());
        assert_eq!(store.inner().records(id).await.len(), 1);
    }
}
