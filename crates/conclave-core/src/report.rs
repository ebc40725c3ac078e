//! Specialist reports and review findings
//!
//! A [`SpecialistReport`] lives for the whole session: its request, context,
//! and finding lists only ever grow. The lists are private and exposed
//! through push methods and slice accessors so the append-only discipline
//! is enforced by construction.

use crate::cache::ContextFinding;
use conclave_retrieval::RetrievalTask;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Review specialty a specialist is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    /// Architecture alignment with existing patterns
    Alignment,
    /// Dependency conflicts, versioning, supply chain
    Dependencies,
    /// Test coverage and quality
    Testing,
    /// Security vulnerabilities
    Security,
    /// Focused deep dive on previously flagged areas
    DeepDive,
}

impl Specialty {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alignment => "alignment",
            Self::Dependencies => "dependencies",
            Self::Testing => "testing",
            Self::Security => "security",
            Self::DeepDive => "deep_dive",
        }
    }
}

impl std::fmt::Display for Specialty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of a review finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or advisory
    Low,
    /// Should be addressed before merge
    Medium,
    /// Blocks merge
    High,
}

/// Category of a review finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    /// Incorrect behavior
    Bug,
    /// Security vulnerability
    Security,
    /// Performance problem
    Performance,
    /// Style or convention violation
    Style,
    /// Architectural misalignment
    Architecture,
    /// Dependency problem
    Dependency,
    /// Type-level error
    TypeError,
}

/// One review finding produced by a specialist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFinding {
    /// Stable identifier within the session
    pub id: String,
    /// Round in which the finding was produced
    pub round: u32,
    /// Iteration in which the finding was produced
    pub iteration: u32,
    /// Severity
    pub severity: Severity,
    /// Category
    pub category: FindingCategory,
    /// File the finding refers to
    pub file: String,
    /// 1-based line number
    pub line: u32,
    /// Description of the issue
    pub description: String,
    /// Suggested fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// A context request issued by a specialist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    /// Specialty that issued the request
    pub specialty: Specialty,
    /// Iteration in which it was issued
    pub iteration: u32,
    /// The retrieval task
    pub task: RetrievalTask,
    /// Deterministic cache key (function of kind + scope + query)
    pub cache_key: String,
}

impl ContextRequest {
    /// Create a request, deriving the cache key from the task
    #[must_use]
    pub fn new(specialty: Specialty, iteration: u32, task: RetrievalTask) -> Self {
        let cache_key = task.cache_key();
        Self {
            specialty,
            iteration,
            task,
            cache_key,
        }
    }
}

/// Report accumulated by one specialist over the session.
///
/// Created when the specialty is first rostered and kept for the rest of
/// the session; later rounds resume it rather than recreate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistReport {
    /// Specialty
    pub specialty: Specialty,
    /// Model the specialist is bound to
    pub model_id: String,
    /// Iterations used over the whole session
    pub iterations: u32,
    /// Confidence in the verdict (0.0 - 1.0)
    pub confidence: f64,
    /// Whether the current round's report is finalized
    pub finalized: bool,
    /// Reason finalization was forced, if it was (timeout, budget, error)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_reason: Option<String>,

    requests: Vec<ContextRequest>,
    context: Vec<Arc<ContextFinding>>,
    findings: Vec<ReviewFinding>,
}

impl SpecialistReport {
    /// Create an empty report bound to a specialty and model
    #[must_use]
    pub fn new(specialty: Specialty, model_id: impl Into<String>) -> Self {
        Self {
            specialty,
            model_id: model_id.into(),
            iterations: 0,
            confidence: 0.0,
            finalized: false,
            forced_reason: None,
            requests: Vec::new(),
            context: Vec::new(),
            findings: Vec::new(),
        }
    }

    /// Record an issued context request
    pub fn push_request(&mut self, request: ContextRequest) {
        self.requests.push(request);
    }

    /// Record a received context finding
    pub fn push_context(&mut self, finding: Arc<ContextFinding>) {
        self.context.push(finding);
    }

    /// Record a review finding
    pub fn push_finding(&mut self, finding: ReviewFinding) {
        self.findings.push(finding);
    }

    /// All context requests issued so far
    #[must_use]
    pub fn requests(&self) -> &[ContextRequest] {
        &self.requests
    }

    /// All context findings received so far
    #[must_use]
    pub fn context(&self) -> &[Arc<ContextFinding>] {
        &self.context
    }

    /// All review findings produced so far
    #[must_use]
    pub fn findings(&self) -> &[ReviewFinding] {
        &self.findings
    }

    /// Highest severity among findings, if any
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// Highest severity among findings produced in one round
    #[must_use]
    pub fn max_severity_in_round(&self, round: u32) -> Option<Severity> {
        self.findings
            .iter()
            .filter(|f| f.round == round)
            .map(|f| f.severity)
            .max()
    }

    /// Count findings at a given severity
    #[must_use]
    pub fn count_severity(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Mark the current round's report finalized
    pub fn finalize(&mut self, confidence: f64, forced_reason: Option<String>) {
        self.confidence = confidence;
        self.finalized = true;
        self.forced_reason = forced_reason;
    }

    /// Reopen the report when the specialty is rostered again.
    ///
    /// Accumulated lists are untouched; only the finalized flag resets.
    pub fn reopen(&mut self) {
        self.finalized = false;
        self.forced_reason = None;
    }

    /// Confidence heuristic: more context raises it, severe findings and
    /// forced finalization lower it. Clamped to [0.1, 0.95].
    #[must_use]
    pub fn estimate_confidence(&self, forced: bool) -> f64 {
        let base = 0.8;
        let context_bonus = (self.context.len() as f64 * 0.02).min(0.1);
        let severity_penalty = self.count_severity(Severity::High) as f64 * 0.2
            + self.count_severity(Severity::Medium) as f64 * 0.1;
        let forced_penalty = if forced { 0.1 } else { 0.0 };
        (base + context_bonus - severity_penalty - forced_penalty).clamp(0.1, 0.95)
    }
}
