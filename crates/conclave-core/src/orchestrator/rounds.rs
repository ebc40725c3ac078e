//! Per-round engine: plan the roster, dispatch specialists in parallel,
//! and aggregate their reports behind an all-must-finish barrier.
//!
//! Specialists are moved into their tasks and handed back when the task
//! finishes, so the same report accumulates across rounds. A specialist
//! that runs past the round's wall-clock budget comes back force-finalized;
//! one whose task panics is replaced by a placeholder report and rebuilt
//! fresh if rostered again.

use crate::cache::ContextFinding;
use crate::error::Result;
use crate::factory::AgentSpec;
use crate::orchestrator::core::ReviewOrchestrator;
use crate::report::{Specialty, SpecialistReport};
use crate::coordinator::{WorkflowKind, WorkflowOperation};
use crate::session::{RoundDecision, RoundMode, RoundRecord};
use crate::specialist::{ReviewSpecialist, RoundInput};
use conclave_retrieval::RetrievalKind;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

impl ReviewOrchestrator {
    /// Run one round and return its sealed record. The record is not yet
    /// persisted; the lifecycle owns persist-before-action.
    pub(super) async fn run_round(&mut self, round_no: u32) -> Result<RoundRecord> {
        let mode = if round_no == 1 {
            RoundMode::Review
        } else {
            RoundMode::Heal
        };
        let roster = self.planner.plan(&self.session);
        info!(
            session_id = %self.session.id,
            round = round_no,
            ?mode,
            ?roster,
            "Starting round"
        );

        if mode == RoundMode::Heal {
            self.refresh_test_results().await;
        }
        self.ensure_specialists(&roster).await?;

        let input = RoundInput {
            change: Arc::new(self.session.change.clone()),
            prior: Arc::clone(&self.prior),
            cache: Arc::clone(&self.cache),
            round: round_no,
        };
        let budget = Duration::from_secs(self.config.specialist_timeout_secs);

        // Dispatch: move each rostered specialist into its task; the task
        // returns it, finalized, when done.
        let mut handles = Vec::with_capacity(roster.len());
        for &specialty in &roster {
            let Some(mut specialist) = self.specialists.remove(&specialty) else {
                continue;
            };
            let input = input.clone();
            let handle = tokio::spawn(async move {
                if timeout(budget, specialist.run_round(&input)).await.is_err() {
                    warn!(%specialty, "Specialist ran past the round budget");
                    specialist.finalize_forced("round wall-clock budget exhausted");
                }
                specialist
            });
            handles.push((specialty, handle));
        }

        // Barrier: every dispatched specialist finishes or is abandoned
        let (specialties, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let mut reports = Vec::with_capacity(specialties.len());
        for (specialty, result) in specialties.into_iter().zip(join_all(handles).await) {
            match result {
                Ok(mut specialist) => {
                    let costs = specialist.take_costs();
                    self.session.costs.tokens_used += costs.tokens_used;
                    self.session.costs.total_cost_usd += costs.total_cost_usd;
                    self.session.costs.external_retrievals += costs.external_retrievals;
                    reports.push(specialist.report().clone());
                    self.specialists.insert(specialist.specialty(), specialist);
                }
                Err(e) => {
                    // The specialist is lost with its task; record a
                    // placeholder under its own specialty so the round
                    // still covers the roster
                    error!(%specialty, error = %e, "Specialist task failed");
                    let mut placeholder = SpecialistReport::new(specialty, "unknown");
                    placeholder.finalize(0.1, Some(format!("specialist task failed: {e}")));
                    reports.push(placeholder);
                }
            }
        }

        let score = self.scorer.score(&reports, round_no);
        let decision = if score >= self.config.score_threshold && round_no < self.session.round_limit
        {
            RoundDecision::Continue
        } else {
            RoundDecision::Stop
        };
        info!(
            session_id = %self.session.id,
            round = round_no,
            score,
            ?decision,
            "Round completed"
        );

        Ok(RoundRecord {
            round: round_no,
            mode,
            roster,
            reports,
            score,
            decision,
            created_at: chrono::Utc::now(),
        })
    }

    /// Compose any rostered specialist that does not exist yet. Existing
    /// specialists keep their accumulated reports.
    async fn ensure_specialists(&mut self, roster: &[Specialty]) -> Result<()> {
        for &specialty in roster {
            if self.specialists.contains_key(&specialty) {
                continue;
            }
            let spec = self.factory.specialist(specialty).await?;
            let AgentSpec::Specialist {
                template, model_id, ..
            } = spec
            else {
                continue;
            };
            let specialist = ReviewSpecialist::new(
                specialty,
                template,
                model_id,
                Arc::clone(&self.model),
                Arc::clone(&self.worker),
                self.config.budgets.clone(),
                Duration::from_secs(self.config.context_timeout_secs),
            );
            self.specialists.insert(specialty, specialist);
        }
        Ok(())
    }

    /// Before a heal round, fetch fresh test results through the workflow
    /// coordinator (deduped across concurrent requesters) and seed them
    /// into the context cache.
    async fn refresh_test_results(&mut self) {
        let operation =
            WorkflowOperation::new(WorkflowKind::GetTestResults, &self.session.change.target_ref);
        let key = operation.dedupe_key();
        self.workflows.invalidate(&key).await;

        match self.workflows.submit(operation).await {
            Ok(result) if result.success => {
                // Keyed per round: the cache is write-once and each heal
                // round needs the fresh results
                let round = self.session.round + 1;
                let finding = ContextFinding::success(
                    format!("coverage_lookup::{key}:round{round}"),
                    RetrievalKind::CoverageLookup,
                    format!("test results for {}", self.session.change.target_ref),
                    result.output,
                );
                self.cache.insert_if_absent(finding);
            }
            Ok(result) => {
                warn!(
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Test results unavailable for heal round"
                );
            }
            Err(e) => {
                warn!(error = %e, "Workflow coordinator rejected test-results fetch");
            }
        }
    }
}
