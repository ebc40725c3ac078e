//! Review sessions and their lifecycle
//!
//! A [`Session`] is the unit of work: one change under review, a forward-only
//! status, a monotonic round counter bounded by a limit fixed at creation,
//! and an append-only history of sealed [`RoundRecord`]s.

use crate::config::{EngineConfig, RoundLimits};
use crate::error::{Error, Result};
use crate::report::{Severity, SpecialistReport, Specialty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Complexity of a change, classified once at session creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Up to 2 changed files
    Simple,
    /// Up to 10 changed files
    Medium,
    /// More than 10 changed files
    Complex,
}

impl Complexity {
    /// Classify from the number of changed files
    #[must_use]
    pub fn classify(changed_files: usize) -> Self {
        match changed_files {
            0..=2 => Self::Simple,
            3..=10 => Self::Medium,
            _ => Self::Complex,
        }
    }

    /// Round limit for this complexity under the given limits
    #[must_use]
    pub fn round_limit(&self, limits: &RoundLimits) -> u32 {
        match self {
            Self::Simple => limits.simple,
            Self::Medium => limits.medium,
            Self::Complex => limits.complex,
        }
    }
}

/// Session status. Transitions are forward-only; the single backward-looking
/// edge is Stalled -> AwaitingDecision, used to resume a session whose last
/// round completed but failed to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Classifying the change and loading prior knowledge
    Planning,
    /// Rounds are running
    Active,
    /// A round completed and persisted; deciding whether to continue
    AwaitingDecision,
    /// A completed round could not be persisted
    Stalled,
    /// Terminal
    Done,
}

impl SessionStatus {
    /// Whether a transition to `next` is allowed
    #[must_use]
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Planning, Active)
                | (Planning, Stalled)
                | (Active, AwaitingDecision)
                | (Active, Stalled)
                | (AwaitingDecision, Active)
                | (AwaitingDecision, Done)
                | (AwaitingDecision, Stalled)
                | (Stalled, AwaitingDecision)
        )
    }
}

/// Whether a round reviewed the change or healed previously found problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundMode {
    /// Fresh review of the change
    Review,
    /// Follow-up pass over prior findings
    Heal,
}

/// The change under review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Ref or identifier of the change (branch, PR number, commit range)
    pub target_ref: String,
    /// Human-readable title
    pub title: String,
    /// Unified diff of the change
    pub diff: String,
    /// Paths touched by the change
    pub changed_files: Vec<String>,
}

impl ChangeRequest {
    /// Create a change request
    #[must_use]
    pub fn new(
        target_ref: impl Into<String>,
        title: impl Into<String>,
        diff: impl Into<String>,
        changed_files: Vec<String>,
    ) -> Self {
        Self {
            target_ref: target_ref.into(),
            title: title.into(),
            diff: diff.into(),
            changed_files,
        }
    }
}

/// Cost and usage counters accumulated over a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostCounters {
    /// Model tokens consumed
    pub tokens_used: u64,
    /// Total attributed cost
    pub total_cost_usd: f64,
    /// External retrievals actually executed (cache misses)
    pub external_retrievals: u64,
}

/// Decision sealed into a round record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundDecision {
    /// Score cleared the threshold with rounds remaining
    Continue,
    /// Below threshold, or the round limit was reached
    Stop,
}

/// Sealed record of one completed round. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 1-based round number
    pub round: u32,
    /// Review or heal
    pub mode: RoundMode,
    /// Specialties that ran in this round
    pub roster: Vec<Specialty>,
    /// Snapshot of each rostered specialist's report at round end
    pub reports: Vec<SpecialistReport>,
    /// Aggregate score of the round
    pub score: f64,
    /// Continue/stop decision taken from this round
    pub decision: RoundDecision,
    /// When the record was sealed
    pub created_at: DateTime<Utc>,
}

impl RoundRecord {
    /// Highest severity among findings produced in this round. Reports
    /// accumulate across rounds, so this filters to the round's own
    /// findings.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.reports
            .iter()
            .filter_map(|r| r.max_severity_in_round(self.round))
            .max()
    }

    /// Total findings across all reports in the round
    #[must_use]
    pub fn total_findings(&self) -> usize {
        self.reports.iter().map(|r| r.findings().len()).sum()
    }
}

/// Overall verdict rolled up from a session's final round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No findings worth blocking on
    Approve,
    /// Medium findings present
    RequestChanges,
    /// High findings present
    Block,
}

/// A review session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session id
    pub id: Uuid,
    /// The change under review
    pub change: ChangeRequest,
    /// Complexity, fixed at creation
    pub complexity: Complexity,
    /// Rounds completed so far
    pub round: u32,
    /// Round limit, fixed at creation
    pub round_limit: u32,
    /// Current status
    pub status: SessionStatus,
    /// Configuration variant label
    pub variant: String,
    /// Accumulated costs
    pub costs: CostCounters,
    /// Sealed history of persisted rounds
    pub rounds: Vec<RoundRecord>,
    /// A completed round that has not yet been persisted. Present only
    /// while stalled; resume re-persists it without re-running the round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_round: Option<RoundRecord>,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// When the session reached Done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session for a change. Complexity and the round limit are
    /// fixed here and never change afterwards.
    #[must_use]
    pub fn new(change: ChangeRequest, config: &EngineConfig) -> Self {
        let complexity = Complexity::classify(change.changed_files.len());
        let round_limit = complexity.round_limit(&config.round_limits);
        Self {
            id: Uuid::new_v4(),
            change,
            complexity,
            round: 0,
            round_limit,
            status: SessionStatus::Planning,
            variant: config.variant.clone(),
            costs: CostCounters::default(),
            rounds: Vec::new(),
            pending_round: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Transition to a new status, rejecting disallowed edges
    pub fn transition(&mut self, next: SessionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "invalid status transition {:?} -> {next:?}",
                self.status
            )));
        }
        self.status = next;
        if next == SessionStatus::Done {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Whether another round may start
    #[must_use]
    pub fn rounds_remaining(&self) -> bool {
        self.round < self.round_limit
    }

    /// Seal a persisted round into history and bump the counter
    pub fn commit_round(&mut self, record: RoundRecord) {
        self.round = record.round;
        self.rounds.push(record);
        self.pending_round = None;
    }

    /// The last persisted round, if any
    #[must_use]
    pub fn last_round(&self) -> Option<&RoundRecord> {
        self.rounds.last()
    }

    /// Roll the final round's reports up into an overall verdict
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        match self.last_round().and_then(RoundRecord::max_severity) {
            Some(Severity::High) => Verdict::Block,
            Some(Severity::Medium) => Verdict::RequestChanges,
            _ => Verdict::Approve,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(files: usize) -> ChangeRequest {
        ChangeRequest::new(
            "pr-42",
            "test change",
            "diff --git a/x b/x",
            (0..files).map(|i| format!("file{i}.rs")).collect(),
        )
    }

    #[test]
    fn test_complexity_classification() {
        assert_eq!(Complexity::classify(0), Complexity::Simple);
        assert_eq!(Complexity::classify(2), Complexity::Simple);
        assert_eq!(Complexity::classify(3), Complexity::Medium);
        assert_eq!(Complexity::classify(10), Complexity::Medium);
        assert_eq!(Complexity::classify(11), Complexity::Complex);
    }

    #[test]
    fn test_round_limit_fixed_at_creation() {
        let config = EngineConfig::default();
        let session = Session::new(change(5), &config);
        assert_eq!(session.complexity, Complexity::Medium);
        assert_eq!(session.round_limit, 2);
        assert_eq!(session.round, 0);
    }

    #[test]
    fn test_status_forward_only() {
        use SessionStatus::*;
        assert!(Planning.can_transition_to(Active));
        assert!(Active.can_transition_to(AwaitingDecision));
        assert!(AwaitingDecision.can_transition_to(Done));
        assert!(AwaitingDecision.can_transition_to(Active));

        assert!(!Done.can_transition_to(Active));
        assert!(!Done.can_transition_to(Planning));
        assert!(!Active.can_transition_to(Planning));
        assert!(!AwaitingDecision.can_transition_to(Planning));
    }

    #[test]
    fn test_stalled_resumes_to_awaiting_decision() {
        use SessionStatus::*;
        assert!(Active.can_transition_to(Stalled));
        assert!(Stalled.can_transition_to(AwaitingDecision));
        assert!(!Stalled.can_transition_to(Active));
        assert!(!Stalled.can_transition_to(Done));
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let config = EngineConfig::default();
        let mut session = Session::new(change(1), &config);
        assert!(session.transition(SessionStatus::Done).is_err());
        session.transition(SessionStatus::Active).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[test]
    fn test_commit_round_bumps_counter_and_clears_pending() {
        let config = EngineConfig::default();
        let mut session = Session::new(change(1), &config);
        let record = RoundRecord {
            round: 1,
            mode: RoundMode::Review,
            roster: vec![Specialty::Alignment],
            reports: vec![],
            score: 0.0,
            decision: RoundDecision::Stop,
            created_at: Utc::now(),
        };
        session.pending_round = Some(record.clone());
        session.commit_round(record);
        assert_eq!(session.round, 1);
        assert_eq!(session.rounds.len(), 1);
        assert!(session.pending_round.is_none());
    }

    #[test]
    fn test_verdict_rollup() {
        let config = EngineConfig::default();
        let mut session = Session::new(change(1), &config);
        assert_eq!(session.verdict(), Verdict::Approve);

        let mut report = SpecialistReport::new(Specialty::Security, "m");
        report.push_finding(crate::report::ReviewFinding {
            id: "f1".into(),
            round: 1,
            iteration: 1,
            severity: Severity::High,
            category: crate::report::FindingCategory::Security,
            file: "a.rs".into(),
            line: 3,
            description: "injection".into(),
            suggestion: None,
        });
        session.commit_round(RoundRecord {
            round: 1,
            mode: RoundMode::Review,
            roster: vec![Specialty::Security],
            reports: vec![report],
            score: 3.0,
            decision: RoundDecision::Stop,
            created_at: Utc::now(),
        });
        assert_eq!(session.verdict(), Verdict::Block);
    }
}
