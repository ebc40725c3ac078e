//! Round scoring
//!
//! The quality gate between rounds: a strategy turns a round's reports into
//! a single score, compared against the configured threshold. Reports
//! accumulate across rounds, so strategies score only the findings the
//! given round produced. The default weighs findings by severity.

use crate::report::{Severity, SpecialistReport};

/// Strategy for scoring a completed round
pub trait ScoreStrategy: Send + Sync {
    /// Score the findings round `round` produced across the reports
    fn score(&self, reports: &[SpecialistReport], round: u32) -> f64;
}

/// Severity-weighted scoring: high 3.0, medium 1.5, low 0.5
#[derive(Debug, Default)]
pub struct SeverityWeighted;

impl SeverityWeighted {
    fn weight(severity: Severity) -> f64 {
        match severity {
            Severity::High => 3.0,
            Severity::Medium => 1.5,
            Severity::Low => 0.5,
        }
    }
}

impl ScoreStrategy for SeverityWeighted {
    fn score(&self, reports: &[SpecialistReport], round: u32) -> f64 {
        reports
            .iter()
            .flat_map(|r| r.findings())
            .filter(|f| f.round == round)
            .map(|f| Self::weight(f.severity))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FindingCategory, ReviewFinding, Specialty};

    fn report_with(round: u32, severities: &[Severity]) -> SpecialistReport {
        let mut report = SpecialistReport::new(Specialty::Testing, "m");
        for (i, &severity) in severities.iter().enumerate() {
            report.push_finding(ReviewFinding {
                id: format!("f{i}"),
                round,
                iteration: 1,
                severity,
                category: FindingCategory::Bug,
                file: "a.rs".into(),
                line: 1,
                description: "x".into(),
                suggestion: None,
            });
        }
        report
    }

    #[test]
    fn test_empty_round_scores_zero() {
        assert_eq!(SeverityWeighted.score(&[], 1), 0.0);
        assert_eq!(SeverityWeighted.score(&[report_with(1, &[])], 1), 0.0);
    }

    #[test]
    fn test_severity_weights() {
        let reports = vec![
            report_with(1, &[Severity::High]),
            report_with(1, &[Severity::Medium, Severity::Low]),
        ];
        assert_eq!(SeverityWeighted.score(&reports, 1), 5.0);
    }

    #[test]
    fn test_earlier_rounds_do_not_leak_into_later_scores() {
        let mut report = report_with(1, &[Severity::High]);
        report.push_finding(ReviewFinding {
            id: "later".into(),
            round: 2,
            iteration: 1,
            severity: Severity::Low,
            category: FindingCategory::Bug,
            file: "a.rs".into(),
            line: 1,
            description: "x".into(),
            suggestion: None,
        });

        let reports = vec![report];
        assert_eq!(SeverityWeighted.score(&reports, 1), 3.0);
        assert_eq!(SeverityWeighted.score(&reports, 2), 0.5);
    }

    #[test]
    fn test_one_high_clears_default_threshold() {
        let score = SeverityWeighted.score(&[report_with(1, &[Severity::High])], 1);
        assert!(score >= 3.0);
    }
}
