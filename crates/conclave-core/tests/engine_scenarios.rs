//! End-to-end engine scenarios: full sessions driven by scripted models,
//! counting retrievers, and flaky stores.

use async_trait::async_trait;
use conclave_core::memory::FlakyStore;
use conclave_core::{
    Analysis, ChangeRequest, EngineConfig, Error, InMemoryStore, PlanDecision,
    ReviewFinding, ReviewOrchestrator, RoundMode, Severity, SessionStatus, SpecialistModel,
    SpecialistView, Specialty, Verdict, WorkflowBackend, WorkflowCoordinator, WorkflowKind,
    WorkflowOperation,
};
use conclave_core::report::FindingCategory;
use conclave_retrieval::{
    RetrievalKind, RetrievalOutput, RetrievalTask, Retriever, RetrieverDefinition,
    RetrieverRegistry,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

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
        task: &RetrievalTask,
    ) -> conclave_retrieval::Result<RetrievalOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RetrievalOutput::success(
            serde_json::json!({"query": task.query}),
            2,
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

struct NullBackend;

#[async_trait]
impl WorkflowBackend for NullBackend {
    async fn execute(
        &self,
        _operation: &WorkflowOperation,
    ) -> conclave_core::Result<serde_json::Value> {
        Ok(serde_json::json!({"status": "ok"}))
    }
}

fn change(files: usize) -> ChangeRequest {
    ChangeRequest::new(
        "target-42",
        "scenario change",
        "diff --git",
        (0..files).map(|i| format!("src/mod{i}.rs")).collect(),
    )
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default().with_rng_seed(3);
    config.persist_retry = conclave_core::retry::RetryConfig::new()
        .with_max_attempts(3)
        .with_initial_delay(std::time::Duration::from_millis(1));
    config
}

/// Emits findings of a per-round severity; None means a clean round.
struct SeverityByRound {
    schedule: Vec<Option<Severity>>,
}

#[async_trait]
impl SpecialistModel for SeverityByRound {
    async fn plan(&self, _view: &SpecialistView<'_>) -> conclave_core::Result<PlanDecision> {
        Ok(PlanDecision::default())
    }

    async fn analyze(&self, view: &SpecialistView<'_>) -> conclave_core::Result<Analysis> {
        let severity = self
            .schedule
            .get(view.round as usize - 1)
            .copied()
            .flatten();
        let findings = severity
            .map(|severity| {
                vec![ReviewFinding {
                    id: format!("{}-r{}-i{}", view.specialty, view.round, view.iteration),
                    round: view.round,
                    iteration: view.iteration,
                    severity,
                    category: FindingCategory::Bug,
                    file: "src/mod0.rs".into(),
                    line: 5,
                    description: format!("round {} issue", view.round),
                    suggestion: None,
                }]
            })
            .unwrap_or_default();
        Ok(Analysis {
            findings,
            needs_more_context: false,
            ..Analysis::default()
        })
    }
}

// Scenario 1: a simple change whose round scores below the threshold stops
// after its single round.
#[tokio::test]
async fn scenario_simple_session_one_round() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut orch = ReviewOrchestrator::new(
        change(2),
        config(),
        Arc::new(SeverityByRound {
            schedule: vec![Some(Severity::Low)],
        }),
        counting_registry(calls),
        Arc::new(InMemoryStore::new()),
        Arc::new(NullBackend),
    )
    .unwrap();

    let outcome = orch.run().await.unwrap();
    assert_eq!(outcome.rounds, 1);
    assert_eq!(orch.session().round_limit, 1);
    assert_eq!(orch.session().status, SessionStatus::Done);

    let record = orch.session().last_round().unwrap();
    // Simple roster: alignment and testing, each with one low finding
    assert_eq!(record.roster.len(), 2);
    assert!(record.roster.contains(&Specialty::Alignment));
    assert!(record.roster.contains(&Specialty::Testing));
    assert_eq!(record.score, 1.0);
}

// Scenario 2: a complex change with persistent findings runs to its round
// limit with every round persisted, then stops.
#[tokio::test]
async fn scenario_complex_session_runs_to_limit() {
    let store = Arc::new(InMemoryStore::new());
    let mut orch = ReviewOrchestrator::new(
        change(15),
        config(),
        Arc::new(SeverityByRound {
            schedule: vec![
                Some(Severity::High),
                Some(Severity::Medium),
                Some(Severity::Low),
            ],
        }),
        counting_registry(Arc::new(AtomicU32::new(0))),
        store.clone(),
        Arc::new(NullBackend),
    )
    .unwrap();

    let outcome = orch.run().await.unwrap();
    assert_eq!(outcome.rounds, 3);
    assert!(outcome.rounds <= orch.session().round_limit);

    let records = store.records(orch.session().id).await;
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].roster.len(), 4);
    assert_eq!(records[0].mode, RoundMode::Review);
    // High findings in round 1 roster a deep dive in round 2
    assert!(records[1].roster.contains(&Specialty::DeepDive));
    assert_eq!(records[1].mode, RoundMode::Heal);
    // Scores decline as the change heals
    assert!(records[0].score > records[1].score);
    assert!(records[1].score > records[2].score);

    // Append-only: a specialist rostered in consecutive rounds carries its
    // earlier findings forward
    for report in &records[1].reports {
        let earlier = records[0]
            .reports
            .iter()
            .find(|r| r.specialty == report.specialty);
        if let Some(earlier) = earlier {
            assert!(report.findings().len() >= earlier.findings().len());
        }
    }
}

/// Every specialty requests the identical retrieval task; the testing
/// specialist asks after the alignment specialist's retrieval has landed.
struct SharedRequestModel;

#[async_trait]
impl SpecialistModel for SharedRequestModel {
    async fn plan(&self, view: &SpecialistView<'_>) -> conclave_core::Result<PlanDecision> {
        if view.specialty == Specialty::Testing {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        let requests = if view.report.requests().is_empty() {
            vec![RetrievalTask::new(
                RetrievalKind::TextSearch,
                vec!["src/mod0.rs".into()],
                "error handling",
            )]
        } else {
            vec![]
        };
        Ok(PlanDecision {
            requests,
            ..PlanDecision::default()
        })
    }

    async fn analyze(&self, _view: &SpecialistView<'_>) -> conclave_core::Result<Analysis> {
        Ok(Analysis {
            needs_more_context: false,
            ..Analysis::default()
        })
    }
}

// Scenario 3: identical context requests from different specialists in the
// same round share one external retrieval.
#[tokio::test]
async fn scenario_duplicate_context_request_retrieves_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut orch = ReviewOrchestrator::new(
        change(2),
        config(),
        Arc::new(SharedRequestModel),
        counting_registry(calls.clone()),
        Arc::new(InMemoryStore::new()),
        Arc::new(NullBackend),
    )
    .unwrap();

    orch.run().await.unwrap();

    // Two specialists issued the identical request; the later one was
    // served from cache with no second external call
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(orch.cache().len(), 1);
    let record = orch.session().last_round().unwrap();
    let mut summaries = Vec::new();
    for report in &record.reports {
        assert_eq!(report.requests().len(), 1);
        assert_eq!(report.context().len(), 1);
        summaries.push(report.context()[0].summary.clone());
    }
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0], summaries[1]);
}

struct SlowCountingBackend {
    executions: Arc<AtomicU32>,
}

#[async_trait]
impl WorkflowBackend for SlowCountingBackend {
    async fn execute(
        &self,
        _operation: &WorkflowOperation,
    ) -> conclave_core::Result<serde_json::Value> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        Ok(serde_json::json!({"tests": "green"}))
    }
}

// Scenario 4: concurrent submits sharing a dedupe key collapse into one
// execution, with the result delivered to every requester.
#[tokio::test]
async fn scenario_workflow_dedupe_across_requesters() {
    let executions = Arc::new(AtomicU32::new(0));
    let coordinator = Arc::new(WorkflowCoordinator::new(Arc::new(SlowCountingBackend {
        executions: executions.clone(),
    })));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .submit(WorkflowOperation::new(WorkflowKind::RunCi, "target-42"))
                .await
                .unwrap()
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(results.len(), 4);
    for result in &results {
        assert!(result.success);
        assert_eq!(result.dedupe_key, "run_ci:target-42");
        assert_eq!(result.output, serde_json::json!({"tests": "green"}));
    }
}

// Scenario 5: a store that refuses all configured write attempts stalls
// the session; manual resume re-persists the same round without re-running.
#[tokio::test]
async fn scenario_persistence_failure_stall_and_resume() {
    let store = Arc::new(FlakyStore::new(InMemoryStore::new(), 3));
    let mut orch = ReviewOrchestrator::new(
        change(2),
        config(),
        Arc::new(SeverityByRound {
            schedule: vec![Some(Severity::Medium)],
        }),
        counting_registry(Arc::new(AtomicU32::new(0))),
        store.clone(),
        Arc::new(NullBackend),
    )
    .unwrap();

    let err = orch.run().await.unwrap_err();
    assert!(matches!(err, Error::Persistence(_)));
    assert_eq!(orch.session().status, SessionStatus::Stalled);
    assert!(orch.session().completed_at.is_none());
    assert_eq!(store.inner().records(orch.session().id).await.len(), 0);
    let pending = orch.session().pending_round.clone().unwrap();

    let outcome = orch.run().await.unwrap();
    assert_eq!(orch.session().status, SessionStatus::Done);
    assert_eq!(outcome.verdict, Verdict::RequestChanges);

    let persisted = store.inner().records(orch.session().id).await;
    assert_eq!(persisted.len(), 1);
    // The same record, not a re-run: identical creation time and score
    assert_eq!(persisted[0].created_at, pending.created_at);
    assert_eq!(persisted[0].score, pending.score);
}
