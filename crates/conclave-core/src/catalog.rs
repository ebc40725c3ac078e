//! Agent template catalog
//!
//! Immutable per-role templates: prompt skeleton, allowed retrieval kinds,
//! iteration and context budgets, timeouts, and the model tier to draw from.
//! The catalog is built once and only read afterwards.

use crate::pools::{PoolTier, SelectionPolicy};
use crate::report::Specialty;
use conclave_retrieval::RetrievalKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable template describing one agent role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTemplate {
    /// Stable template id
    pub id: String,
    /// Role label (specialist specialty or worker kind)
    pub role: String,
    /// Display name
    pub name: String,
    /// Prompt skeleton the model adapter fills in
    pub prompt_skeleton: String,
    /// Retrieval kinds this agent may request
    pub allowed_kinds: Vec<RetrievalKind>,
    /// Iteration budget per round
    pub max_iterations: u32,
    /// Maximum context requests honored per iteration
    pub context_budget: usize,
    /// Wall-clock budget per iteration, in seconds
    pub iteration_timeout_secs: u64,
    /// Wall-clock budget per context request, in seconds
    pub request_timeout_secs: u64,
    /// Model tier to select from
    pub tier: PoolTier,
    /// Selection policy within the tier
    pub policy: SelectionPolicy,
}

/// Catalog of templates for specialists and context workers
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    specialists: HashMap<Specialty, AgentTemplate>,
    workers: HashMap<RetrievalKind, AgentTemplate>,
}

fn specialist_template(
    specialty: Specialty,
    prompt: &str,
    allowed_kinds: Vec<RetrievalKind>,
    max_iterations: u32,
    context_budget: usize,
) -> AgentTemplate {
    AgentTemplate {
        id: format!("specialist:{specialty}"),
        role: specialty.as_str().to_string(),
        name: format!("{specialty} reviewer"),
        prompt_skeleton: prompt.to_string(),
        allowed_kinds,
        max_iterations,
        context_budget,
        iteration_timeout_secs: 120,
        request_timeout_secs: 60,
        tier: PoolTier::CheapCoding,
        policy: SelectionPolicy::Fixed,
    }
}

fn worker_template(kind: RetrievalKind) -> AgentTemplate {
    AgentTemplate {
        id: format!("worker:{kind}"),
        role: kind.as_str().to_string(),
        name: format!("{kind} worker"),
        prompt_skeleton: "Summarize the retrieved material for a reviewer.".to_string(),
        allowed_kinds: vec![kind],
        max_iterations: 1,
        context_budget: 1,
        iteration_timeout_secs: 60,
        request_timeout_secs: 60,
        tier: PoolTier::CheapToolUse,
        policy: SelectionPolicy::Fixed,
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        use RetrievalKind::*;
        let mut specialists = HashMap::new();
        specialists.insert(
            Specialty::Alignment,
            specialist_template(
                Specialty::Alignment,
                "Assess whether the change fits the codebase's existing \
                 architecture and conventions.",
                vec![TextSearch, SymbolLookup, HistoryLookup],
                3,
                2,
            ),
        );
        specialists.insert(
            Specialty::Dependencies,
            specialist_template(
                Specialty::Dependencies,
                "Check for dependency conflicts, version pinning problems, \
                 and supply-chain risk introduced by the change.",
                vec![TextSearch, HistoryLookup],
                2,
                2,
            ),
        );
        specialists.insert(
            Specialty::Testing,
            specialist_template(
                Specialty::Testing,
                "Evaluate test coverage and quality for the changed code.",
                vec![TextSearch, CoverageLookup],
                2,
                1,
            ),
        );
        specialists.insert(
            Specialty::Security,
            specialist_template(
                Specialty::Security,
                "Look for security vulnerabilities introduced or exposed \
                 by the change.",
                vec![TextSearch, SymbolLookup, HistoryLookup],
                2,
                2,
            ),
        );
        specialists.insert(
            Specialty::DeepDive,
            specialist_template(
                Specialty::DeepDive,
                "Re-examine the areas flagged in earlier rounds in depth.",
                vec![TextSearch, SymbolLookup, HistoryLookup, CoverageLookup],
                3,
                3,
            ),
        );

        let mut workers = HashMap::new();
        for kind in [TextSearch, SymbolLookup, HistoryLookup, CoverageLookup] {
            workers.insert(kind, worker_template(kind));
        }

        Self {
            specialists,
            workers,
        }
    }
}

impl TemplateCatalog {
    /// Create the default catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Template for a specialty
    #[must_use]
    pub fn specialist(&self, specialty: Specialty) -> Option<&AgentTemplate> {
        self.specialists.get(&specialty)
    }

    /// Template for a context worker kind
    #[must_use]
    pub fn worker(&self, kind: RetrievalKind) -> Option<&AgentTemplate> {
        self.workers.get(&kind)
    }

    /// All specialties with a template
    #[must_use]
    pub fn specialties(&self) -> Vec<Specialty> {
        self.specialists.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        let catalog = TemplateCatalog::new();
        let alignment = catalog.specialist(Specialty::Alignment).unwrap();
        assert_eq!(alignment.max_iterations, 3);
        assert_eq!(alignment.context_budget, 2);

        let testing = catalog.specialist(Specialty::Testing).unwrap();
        assert_eq!(testing.max_iterations, 2);
        assert_eq!(testing.context_budget, 1);

        let deep = catalog.specialist(Specialty::DeepDive).unwrap();
        assert_eq!(deep.max_iterations, 3);
        assert_eq!(deep.context_budget, 3);
    }

    #[test]
    fn test_allowed_kinds_are_scoped() {
        let catalog = TemplateCatalog::new();
        let testing = catalog.specialist(Specialty::Testing).unwrap();
        assert!(testing.allowed_kinds.contains(&RetrievalKind::CoverageLookup));
        assert!(!testing.allowed_kinds.contains(&RetrievalKind::HistoryLookup));
    }

    #[test]
    fn test_every_kind_has_a_worker_template() {
        let catalog = TemplateCatalog::new();
        for kind in [
            RetrievalKind::TextSearch,
            RetrievalKind::SymbolLookup,
            RetrievalKind::HistoryLookup,
            RetrievalKind::CoverageLookup,
        ] {
            assert!(catalog.worker(kind).is_some());
        }
    }
}
