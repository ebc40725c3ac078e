//! Conclave core - multi-agent code review orchestration
//!
//! One [`ReviewOrchestrator`] per change under review: it classifies the
//! change, runs bounded quality-gated rounds of parallel specialist review
//! backed by cached context retrieval, persists every round before acting
//! on it, and proposes terminal actions. A shared [`WorkflowCoordinator`]
//! deduplicates expensive CI and test operations across requesters.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod actions;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod factory;
pub mod memory;
pub mod orchestrator;
pub mod pools;
pub mod report;
pub mod retry;
pub mod roster;
pub mod scatter;
pub mod scoring;
pub mod session;
pub mod specialist;

pub use actions::ProposedAction;
pub use cache::{ContextFinding, FindingCache};
pub use catalog::{AgentTemplate, TemplateCatalog};
pub use config::{EngineConfig, IterationBudgetMode, SelectionMode, SpecialistBudgets};
pub use context::{ContextWorker, Summarizer};
pub use coordinator::{
    WorkflowBackend, WorkflowCoordinator, WorkflowKind, WorkflowOperation, WorkflowResult,
};
pub use error::{Error, Result};
pub use factory::{AgentFactory, AgentSpec};
pub use memory::{InMemoryStore, MemoryStore, PriorKnowledge};
pub use orchestrator::{HandoffGate, ReviewOrchestrator, SessionOutcome};
pub use pools::{AvailabilityProbe, ModelPoolRegistry, PoolTier, SelectionPolicy};
pub use report::{
    ContextRequest, FindingCategory, ReviewFinding, Severity, SpecialistReport, Specialty,
};
pub use roster::RosterPlanner;
pub use scoring::{ScoreStrategy, SeverityWeighted};
pub use session::{
    ChangeRequest, Complexity, CostCounters, RoundDecision, RoundMode, RoundRecord, Session,
    SessionStatus, Verdict,
};
pub use specialist::{
    Analysis, PlanDecision, ReviewSpecialist, RoundInput, SpecialistModel, SpecialistView,
};
