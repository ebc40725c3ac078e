//! Proposed actions
//!
//! Terminal output of a session: review comments and fix specifications
//! derived from persisted round records. Actions are proposals only; nothing
//! here executes them against the change.

use crate::report::{ReviewFinding, Severity, Specialty};
use crate::session::RoundRecord;
use serde::{Deserialize, Serialize};

/// An action proposed from review findings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposedAction {
    /// A review comment on a specific line
    Comment {
        /// File to comment on
        file: String,
        /// 1-based line
        line: u32,
        /// Comment body
        body: String,
    },
    /// A specification for a follow-up fix
    FixSpec {
        /// Specialty whose findings motivated the fix
        specialty: Specialty,
        /// One-line summary
        summary: String,
        /// The findings the fix must address
        findings: Vec<ReviewFinding>,
    },
}

/// Derive actions from a persisted round record.
///
/// Low findings become comments; medium and high findings are grouped per
/// specialty into fix specs, with their own comments alongside.
#[must_use]
pub fn propose_actions(record: &RoundRecord) -> Vec<ProposedAction> {
    let mut actions = Vec::new();

    for report in &record.reports {
        let mut actionable: Vec<ReviewFinding> = Vec::new();
        for finding in report.findings() {
            let body = match &finding.suggestion {
                Some(suggestion) => {
                    format!("[{}] {} Suggestion: {suggestion}", report.specialty, finding.description)
                }
                None => format!("[{}] {}", report.specialty, finding.description),
            };
            actions.push(ProposedAction::Comment {
                file: finding.file.clone(),
                line: finding.line,
                body,
            });
            if finding.severity >= Severity::Medium {
                actionable.push(finding.clone());
            }
        }
        if !actionable.is_empty() {
            let high = actionable
                .iter()
                .filter(|f| f.severity == Severity::High)
                .count();
            actions.push(ProposedAction::FixSpec {
                specialty: report.specialty,
                summary: format!(
                    "{} findings from {} review ({high} blocking)",
                    actionable.len(),
                    report.specialty
                ),
                findings: actionable,
            });
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FindingCategory, SpecialistReport};
    use crate::session::{RoundDecision, RoundMode};

    fn finding(severity: Severity) -> ReviewFinding {
        ReviewFinding {
            id: "f".into(),
            round: 1,
            iteration: 1,
            severity,
            category: FindingCategory::Bug,
            file: "src/auth.rs".into(),
            line: 10,
            description: "token not validated".into(),
            suggestion: Some("validate before use".into()),
        }
    }

    fn record(reports: Vec<SpecialistReport>) -> RoundRecord {
        RoundRecord {
            round: 1,
            mode: RoundMode::Review,
            roster: reports.iter().map(|r| r.specialty).collect(),
            reports,
            score: 0.0,
            decision: RoundDecision::Stop,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_low_findings_only_comment() {
        let mut report = SpecialistReport::new(Specialty::Testing, "m");
        report.push_finding(finding(Severity::Low));
        let actions = propose_actions(&record(vec![report]));
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], ProposedAction::Comment { .. }));
    }

    #[test]
    fn test_high_findings_get_fix_spec() {
        let mut report = SpecialistReport::new(Specialty::Security, "m");
        report.push_finding(finding(Severity::High));
        report.push_finding(finding(Severity::Medium));
        let actions = propose_actions(&record(vec![report]));

        let fix_specs: Vec<_> = actions
            .iter()
            .filter(|a| matches!(a, ProposedAction::FixSpec { .. }))
            .collect();
        assert_eq!(fix_specs.len(), 1);
        match fix_specs[0] {
            ProposedAction::FixSpec {
                specialty,
                findings,
                summary,
            } => {
                assert_eq!(*specialty, Specialty::Security);
                assert_eq!(findings.len(), 2);
                assert!(summary.contains("1 blocking"));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_empty_round_proposes_nothing() {
        let report = SpecialistReport::new(Specialty::Alignment, "m");
        assert!(propose_actions(&record(vec![report])).is_empty());
    }
}
