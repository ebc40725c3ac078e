//! Orchestrator construction and wiring

use crate::cache::FindingCache;
use crate::catalog::TemplateCatalog;
use crate::config::EngineConfig;
use crate::context::{ContextWorker, Summarizer};
use crate::coordinator::{WorkflowBackend, WorkflowCoordinator};
use crate::error::Result;
use crate::factory::AgentFactory;
use crate::memory::{MemoryStore, PriorKnowledge};
use crate::orchestrator::lifecycle::HandoffGate;
use crate::pools::ModelPoolRegistry;
use crate::report::Specialty;
use crate::roster::RosterPlanner;
use crate::scoring::{ScoreStrategy, SeverityWeighted};
use crate::session::{ChangeRequest, Session};
use crate::specialist::{ReviewSpecialist, SpecialistModel};
use conclave_retrieval::RetrieverRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Orchestrates one review session
pub struct ReviewOrchestrator {
    pub(super) config: EngineConfig,
    pub(super) session: Session,
    pub(super) factory: AgentFactory,
    pub(super) planner: RosterPlanner,
    pub(super) model: Arc<dyn SpecialistModel>,
    pub(super) retrievers: Arc<RetrieverRegistry>,
    pub(super) worker: Arc<ContextWorker>,
    pub(super) memory: Arc<dyn MemoryStore>,
    pub(super) workflows: Arc<WorkflowCoordinator>,
    pub(super) scorer: Box<dyn ScoreStrategy>,
    pub(super) handoff: Option<Arc<dyn HandoffGate>>,
    pub(super) specialists: HashMap<Specialty, ReviewSpecialist>,
    pub(super) cache: Arc<FindingCache>,
    pub(super) prior: Arc<PriorKnowledge>,
    pub(super) cancel: CancellationToken,
}

impl ReviewOrchestrator {
    /// Create an orchestrator for a change. The session's complexity and
    /// round limit are fixed here.
    pub fn new(
        change: ChangeRequest,
        config: EngineConfig,
        model: Arc<dyn SpecialistModel>,
        retrievers: Arc<RetrieverRegistry>,
        memory: Arc<dyn MemoryStore>,
        workflow_backend: Arc<dyn WorkflowBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let mut pools = ModelPoolRegistry::new();
        if let Some(seed) = config.rng_seed {
            pools = pools.with_rng_seed(seed);
        }
        let factory = AgentFactory::new(TemplateCatalog::new(), pools, config.mode);
        let planner = RosterPlanner::new(&config);
        let session = Session::new(change, &config);
        let worker = Arc::new(ContextWorker::new(Arc::clone(&retrievers)));

        Ok(Self {
            config,
            session,
            factory,
            planner,
            model,
            retrievers,
            worker,
            memory,
            workflows: Arc::new(WorkflowCoordinator::new(workflow_backend)),
            scorer: Box::new(SeverityWeighted),
            handoff: None,
            specialists: HashMap::new(),
            cache: Arc::new(FindingCache::new()),
            prior: Arc::new(PriorKnowledge::default()),
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the agent factory (custom catalog or pools)
    #[must_use]
    pub fn with_factory(mut self, factory: AgentFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Attach a summarizer for context workers
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.worker = Arc::new(
            ContextWorker::new(Arc::clone(&self.retrievers)).with_summarizer(summarizer),
        );
        self
    }

    /// Replace the scoring strategy
    #[must_use]
    pub fn with_score_strategy(mut self, scorer: Box<dyn ScoreStrategy>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Attach a handoff gate, consulted before terminal actions when
    /// handoff is enabled in the configuration
    #[must_use]
    pub fn with_handoff_gate(mut self, gate: Arc<dyn HandoffGate>) -> Self {
        self.handoff = Some(gate);
        self
    }

    /// Use an externally shared workflow coordinator so operations dedupe
    /// across sessions
    #[must_use]
    pub fn with_workflow_coordinator(mut self, workflows: Arc<WorkflowCoordinator>) -> Self {
        self.workflows = workflows;
        self
    }

    /// Use an external cancellation token
    #[must_use]
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The session being orchestrated
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The workflow coordinator
    #[must_use]
    pub fn workflows(&self) -> &Arc<WorkflowCoordinator> {
        &self.workflows
    }

    /// The session-scoped context cache
    #[must_use]
    pub fn cache(&self) -> &Arc<FindingCache> {
        &self.cache
    }

    /// Token that cancels the session when triggered
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
