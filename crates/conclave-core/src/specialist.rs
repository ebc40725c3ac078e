//! Review specialists
//!
//! A specialist runs a plan / gather-context / analyze loop inside each
//! round it is rostered for, bounded by its template's iteration budget and
//! per-step timeouts. Every exit path finalizes the report: a specialist
//! that times out, errors, or exhausts its budget still hands back a
//! finalized report so the round barrier can close.

use crate::cache::{ContextFinding, FindingCache};
use crate::catalog::AgentTemplate;
use crate::config::{IterationBudgetMode, SpecialistBudgets};
use crate::context::{ContextOutcome, ContextWorker};
use crate::error::Result;
use crate::memory::PriorKnowledge;
use crate::report::{ContextRequest, ReviewFinding, SpecialistReport, Specialty};
use crate::scatter::{ScatterBatch, TaskOutcome};
use crate::session::{ChangeRequest, CostCounters};
use async_trait::async_trait;
use conclave_retrieval::RetrievalTask;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// What the model decided to retrieve before analyzing
#[derive(Debug, Clone, Default)]
pub struct PlanDecision {
    /// Context to retrieve; empty means analyze with what is on hand
    pub requests: Vec<RetrievalTask>,
    /// Model's reasoning, kept for traceability
    pub reasoning: String,
    /// Tokens consumed by the planning call
    pub tokens_used: u64,
    /// Cost of the planning call
    pub cost_usd: f64,
}

/// Result of one analysis pass
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Findings produced this pass
    pub findings: Vec<ReviewFinding>,
    /// Whether the model wants another plan/context iteration
    pub needs_more_context: bool,
    /// Model's reasoning
    pub reasoning: String,
    /// Tokens consumed by the analysis call
    pub tokens_used: u64,
    /// Cost of the analysis call
    pub cost_usd: f64,
}

/// Read-only view of a specialist's state, handed to the model adapter
pub struct SpecialistView<'a> {
    /// Specialty
    pub specialty: Specialty,
    /// Selected model
    pub model_id: &'a str,
    /// Template in effect
    pub template: &'a AgentTemplate,
    /// The change under review
    pub change: &'a ChangeRequest,
    /// Prior knowledge loaded at session start
    pub prior: &'a PriorKnowledge,
    /// Report accumulated so far
    pub report: &'a SpecialistReport,
    /// 1-based iteration within the session
    pub iteration: u32,
    /// Current round
    pub round: u32,
}

/// Model adapter driving a specialist's decisions
#[async_trait]
pub trait SpecialistModel: Send + Sync {
    /// Decide what context to gather next
    async fn plan(&self, view: &SpecialistView<'_>) -> Result<PlanDecision>;

    /// Analyze the change with the gathered context
    async fn analyze(&self, view: &SpecialistView<'_>) -> Result<Analysis>;
}

/// Inputs shared by every specialist in a round
#[derive(Clone)]
pub struct RoundInput {
    /// The change under review
    pub change: Arc<ChangeRequest>,
    /// Prior knowledge loaded at session start
    pub prior: Arc<PriorKnowledge>,
    /// Session-scoped context cache
    pub cache: Arc<FindingCache>,
    /// 1-based round number
    pub round: u32,
}

/// A review specialist bound to one specialty for the session
pub struct ReviewSpecialist {
    specialty: Specialty,
    template: AgentTemplate,
    report: SpecialistReport,
    model: Arc<dyn SpecialistModel>,
    worker: Arc<ContextWorker>,
    budgets: SpecialistBudgets,
    context_timeout: Duration,
    costs: CostCounters,
}

impl ReviewSpecialist {
    /// Create a specialist from its composed spec
    #[must_use]
    pub fn new(
        specialty: Specialty,
        template: AgentTemplate,
        model_id: String,
        model: Arc<dyn SpecialistModel>,
        worker: Arc<ContextWorker>,
        budgets: SpecialistBudgets,
        context_timeout: Duration,
    ) -> Self {
        Self {
            specialty,
            report: SpecialistReport::new(specialty, model_id),
            template,
            model,
            worker,
            budgets,
            context_timeout,
            costs: CostCounters::default(),
        }
    }

    /// Specialty
    #[must_use]
    pub fn specialty(&self) -> Specialty {
        self.specialty
    }

    /// The accumulated report
    #[must_use]
    pub fn report(&self) -> &SpecialistReport {
        &self.report
    }

    /// Force-finalize with a placeholder confidence; used when the round
    /// barrier abandons a specialist that ran past its wall-clock budget.
    pub fn finalize_forced(&mut self, reason: impl Into<String>) {
        let confidence = self.report.estimate_confidence(true);
        self.report.finalize(confidence.min(0.1), Some(reason.into()));
    }

    /// Drain accumulated costs since the last drain
    pub fn take_costs(&mut self) -> CostCounters {
        std::mem::take(&mut self.costs)
    }

    fn iterations_remaining(&self, round_iterations: u32) -> bool {
        match self.budgets.mode {
            IterationBudgetMode::PerRound => {
                round_iterations < self.template.max_iterations
                    && self.report.iterations < self.budgets.session_iteration_cap
            }
            IterationBudgetMode::Cumulative => {
                self.report.iterations < self.template.max_iterations
            }
        }
    }

    fn view<'a>(&'a self, input: &'a RoundInput) -> SpecialistView<'a> {
        SpecialistView {
            specialty: self.specialty,
            model_id: &self.report.model_id,
            template: &self.template,
            change: &input.change,
            prior: &input.prior,
            report: &self.report,
            iteration: self.report.iterations,
            round: input.round,
        }
    }

    /// Run one round of review. Always returns with a finalized report.
    pub async fn run_round(&mut self, input: &RoundInput) {
        self.report.reopen();
        let mut round_iterations = 0u32;
        let step_budget = Duration::from_secs(self.template.iteration_timeout_secs);

        loop {
            if !self.iterations_remaining(round_iterations) {
                debug!(specialty = %self.specialty, "Iteration budget exhausted");
                let confidence = self.report.estimate_confidence(true);
                self.report
                    .finalize(confidence, Some("iteration budget exhausted".to_string()));
                return;
            }
            round_iterations += 1;
            self.report.iterations += 1;
            let iteration = self.report.iterations;

            // Plan
            let plan = {
                let model = Arc::clone(&self.model);
                let view = self.view(input);
                match timeout(step_budget, model.plan(&view)).await {
                    Ok(Ok(plan)) => plan,
                    Ok(Err(e)) => {
                        warn!(specialty = %self.specialty, error = %e, "Planning failed");
                        let confidence = self.report.estimate_confidence(true);
                        self.report
                            .finalize(confidence, Some(format!("planning failed: {e}")));
                        return;
                    }
                    Err(_) => {
                        warn!(specialty = %self.specialty, "Planning timed out");
                        let confidence = self.report.estimate_confidence(true);
                        self.report
                            .finalize(confidence, Some("planning timed out".to_string()));
                        return;
                    }
                }
            };
            self.costs.tokens_used += plan.tokens_used;
            self.costs.total_cost_usd += plan.cost_usd;

            self.gather_context(input, plan, iteration).await;

            // Analyze
            let analysis = {
                let model = Arc::clone(&self.model);
                let view = self.view(input);
                match timeout(step_budget, model.analyze(&view)).await {
                    Ok(Ok(analysis)) => analysis,
                    Ok(Err(e)) => {
                        warn!(specialty = %self.specialty, error = %e, "Analysis failed");
                        let confidence = self.report.estimate_confidence(true);
                        self.report
                            .finalize(confidence, Some(format!("analysis failed: {e}")));
                        return;
                    }
                    Err(_) => {
                        warn!(specialty = %self.specialty, "Analysis timed out");
                        let confidence = self.report.estimate_confidence(true);
                        self.report
                            .finalize(confidence, Some("analysis timed out".to_string()));
                        return;
                    }
                }
            };
            self.costs.tokens_used += analysis.tokens_used;
            self.costs.total_cost_usd += analysis.cost_usd;
            let finding_count = analysis.findings.len();
            for mut finding in analysis.findings {
                // Stamped here so scoring and roster planning can filter
                // by round regardless of what the adapter filled in
                finding.round = input.round;
                finding.iteration = iteration;
                self.report.push_finding(finding);
            }
            info!(
                specialty = %self.specialty,
                iteration,
                findings = finding_count,
                needs_more = analysis.needs_more_context,
                "Analysis pass completed"
            );

            if !analysis.needs_more_context {
                let confidence = self.report.estimate_confidence(false);
                self.report.finalize(confidence, None);
                return;
            }
        }
    }

    /// Resolve the plan's context requests: cache hits are appended
    /// directly, misses are scattered to context workers and gathered with
    /// an all-must-finish barrier. A worker that times out contributes an
    /// empty finding.
    async fn gather_context(&mut self, input: &RoundInput, plan: PlanDecision, iteration: u32) {
        let tasks: Vec<RetrievalTask> = plan
            .requests
            .into_iter()
            .filter(|t| self.template.allowed_kinds.contains(&t.kind))
            .take(self.template.context_budget)
            .collect();

        let mut batch: ScatterBatch<RetrievalTask, ContextOutcome> = ScatterBatch::new();
        for task in tasks {
            self.report
                .push_request(ContextRequest::new(self.specialty, iteration, task.clone()));

            if let Some(hit) = input.cache.get(&task.cache_key()) {
                self.report.push_context(hit);
                continue;
            }

            let worker = Arc::clone(&self.worker);
            let cache = Arc::clone(&input.cache);
            batch.spawn(task.clone(), self.context_timeout, async move {
                worker.run(&task, &cache).await
            });
        }

        for (task, outcome) in batch.gather().await {
            match outcome {
                TaskOutcome::Completed(outcome) => {
                    if !outcome.cache_hit {
                        self.costs.external_retrievals += 1;
                        self.costs.total_cost_usd += outcome.finding.cost_usd;
                    }
                    self.report.push_context(outcome.finding);
                }
                TaskOutcome::TimedOut => {
                    warn!(specialty = %self.specialty, cache_key = %task.cache_key(), "Context worker timed out");
                    self.report.push_context(Arc::new(ContextFinding::failure(
                        task.cache_key(),
                        task.kind,
                        "context worker timed out",
                    )));
                }
                TaskOutcome::Failed(reason) => {
                    self.report.push_context(Arc::new(ContextFinding::failure(
                        task.cache_key(),
                        task.kind,
                        reason,
                    )));
                }
            }
        }
    }
}
