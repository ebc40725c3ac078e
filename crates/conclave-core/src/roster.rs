//! Roster planning
//!
//! Decides which specialties run each round. The first round's roster comes
//! from the change's complexity; later rounds keep the specialties whose
//! prior findings warrant another look and add a deep dive when something
//! severe was found. An optional exploration rate perturbs the roster with
//! one bounded random addition.

use crate::config::EngineConfig;
use crate::report::{Severity, Specialty};
use crate::session::{RoundRecord, Session};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use tracing::debug;

/// Plans the specialist roster per round
pub struct RosterPlanner {
    exploration_rate: f64,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for RosterPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterPlanner")
            .field("exploration_rate", &self.exploration_rate)
            .finish_non_exhaustive()
    }
}

impl RosterPlanner {
    /// Create a planner from engine configuration
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            exploration_rate: config.exploration_rate,
            rng: Mutex::new(rng),
        }
    }

    /// Default roster for the first round, by complexity
    #[must_use]
    pub fn initial_roster(session: &Session) -> Vec<Specialty> {
        use crate::session::Complexity::*;
        match session.complexity {
            Simple => vec![Specialty::Alignment, Specialty::Testing],
            Medium => vec![Specialty::Alignment, Specialty::Testing, Specialty::Security],
            Complex => vec![
                Specialty::Alignment,
                Specialty::Dependencies,
                Specialty::Testing,
                Specialty::Security,
            ],
        }
    }

    /// Plan the roster for the next round
    #[must_use]
    pub fn plan(&self, session: &Session) -> Vec<Specialty> {
        let mut roster = match session.last_round() {
            None => Self::initial_roster(session),
            Some(last) => Self::follow_up_roster(last, session),
        };
        self.explore(&mut roster);
        debug!(session_id = %session.id, round = session.round + 1, ?roster, "Planned roster");
        roster
    }

    /// Later rounds: keep specialties whose last round produced
    /// medium-or-worse findings, add a deep dive when anything high was
    /// found. Never empty; falls back to the initial roster when no
    /// finding warrants a follow-up.
    fn follow_up_roster(last: &RoundRecord, session: &Session) -> Vec<Specialty> {
        let mut roster: Vec<Specialty> = last
            .reports
            .iter()
            .filter(|r| {
                r.max_severity_in_round(last.round)
                    .is_some_and(|s| s >= Severity::Medium)
            })
            .map(|r| r.specialty)
            .collect();

        let saw_high = last.max_severity() == Some(Severity::High);
        if saw_high && !roster.contains(&Specialty::DeepDive) {
            roster.push(Specialty::DeepDive);
        }
        if roster.is_empty() {
            roster = Self::initial_roster(session);
        }
        roster
    }

    /// With probability `exploration_rate`, add one random absent specialty
    fn explore(&self, roster: &mut Vec<Specialty>) {
        if self.exploration_rate <= 0.0 {
            return;
        }
        let Ok(mut rng) = self.rng.lock() else {
            return;
        };
        if rng.gen::<f64>() >= self.exploration_rate {
            return;
        }
        let absent: Vec<Specialty> = [
            Specialty::Alignment,
            Specialty::Dependencies,
            Specialty::Testing,
            Specialty::Security,
        ]
        .into_iter()
        .filter(|s| !roster.contains(s))
        .collect();
        if let Some(extra) = absent.choose(&mut *rng) {
            debug!(specialty = %extra, "Exploration added a specialty");
            roster.push(*extra);
        }
    }
}
