//! Agent composition
//!
//! The factory is the only place agent specs are assembled: it pairs a
//! template from the catalog with a model from the pools. The set of roles
//! is closed; there is no dynamic registration.

use crate::catalog::{AgentTemplate, TemplateCatalog};
use crate::config::SelectionMode;
use crate::error::{Error, Result};
use crate::pools::{ModelPoolRegistry, PoolTier, SelectionPolicy};
use crate::report::Specialty;
use conclave_retrieval::RetrievalKind;
use tracing::debug;

/// Fully composed description of one agent
#[derive(Debug, Clone)]
pub enum AgentSpec {
    /// The session orchestrator
    Orchestrator {
        /// Model the orchestrator runs on
        model_id: String,
    },
    /// A review specialist
    Specialist {
        /// Specialty
        specialty: Specialty,
        /// Template the spec was composed from
        template: AgentTemplate,
        /// Selected model
        model_id: String,
    },
    /// A context worker
    ContextWorker {
        /// Retrieval kind the worker serves
        kind: RetrievalKind,
        /// Template the spec was composed from
        template: AgentTemplate,
        /// Selected model
        model_id: String,
    },
    /// The workflow coordinator (no model; it only deduplicates operations)
    WorkflowCoordinator,
}

/// Composes agent specs from the catalog and model pools
#[derive(Debug)]
pub struct AgentFactory {
    catalog: TemplateCatalog,
    pools: ModelPoolRegistry,
    mode: SelectionMode,
}

impl AgentFactory {
    /// Create a factory
    #[must_use]
    pub fn new(catalog: TemplateCatalog, pools: ModelPoolRegistry, mode: SelectionMode) -> Self {
        Self {
            catalog,
            pools,
            mode,
        }
    }

    /// The template catalog
    #[must_use]
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    fn escalate(&self, tier: PoolTier) -> PoolTier {
        match (self.mode, tier) {
            (SelectionMode::Advanced, PoolTier::CheapCoding) => PoolTier::ExpensiveCoding,
            (SelectionMode::Advanced, PoolTier::CheapToolUse) => PoolTier::ExpensiveToolUse,
            (_, tier) => tier,
        }
    }

    /// Compose the orchestrator spec
    pub async fn orchestrator(&self) -> AgentSpec {
        let model_id = self
            .pools
            .select("orchestrator", PoolTier::Orchestrator, SelectionPolicy::Fixed)
            .await;
        AgentSpec::Orchestrator { model_id }
    }

    /// Compose a specialist spec for a specialty
    pub async fn specialist(&self, specialty: Specialty) -> Result<AgentSpec> {
        let template = self
            .catalog
            .specialist(specialty)
            .ok_or_else(|| {
                Error::Configuration(format!("no template for specialty {specialty}"))
            })?
            .clone();
        let tier = self.escalate(template.tier);
        let model_id = self
            .pools
            .select(template.role.as_str(), tier, template.policy)
            .await;
        debug!(%specialty, model = %model_id, "Composed specialist");
        Ok(AgentSpec::Specialist {
            specialty,
            template,
            model_id,
        })
    }

    /// Compose a context worker spec for a retrieval kind
    pub async fn context_worker(&self, kind: RetrievalKind) -> Result<AgentSpec> {
        let template = self
            .catalog
            .worker(kind)
            .ok_or_else(|| Error::Configuration(format!("no worker template for kind {kind}")))?
            .clone();
        let tier = self.escalate(template.tier);
        let model_id = self
            .pools
            .select(template.role.as_str(), tier, template.policy)
            .await;
        Ok(AgentSpec::ContextWorker {
            kind,
            template,
            model_id,
        })
    }
}
