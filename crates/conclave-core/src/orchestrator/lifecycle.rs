//! Session state machine
//!
//! INIT -> rounds -> DECIDE -> PERSIST -> DONE, with the stall/resume path
//! on persistence failure. Every completed round is persisted before any
//! decision or action depends on it; a session that cannot persist stalls
//! with the completed round held as pending, and resume re-persists it
//! without re-running anything.

use crate::actions::{propose_actions, ProposedAction};
use crate::error::{Error, Result};
use crate::memory::PriorKnowledge;
use crate::orchestrator::core::ReviewOrchestrator;
use crate::retry::retry_with_backoff;
use crate::session::{RoundDecision, RoundRecord, Session, SessionStatus, Verdict};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Gate consulted before terminal actions when handoff is enabled
#[async_trait]
pub trait HandoffGate: Send + Sync {
    /// Whether the proposed actions may be released
    async fn approve(&self, session: &Session, actions: &[ProposedAction]) -> Result<bool>;
}

/// Terminal result of a session
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Overall verdict rolled up from the final round
    pub verdict: Verdict,
    /// Actions proposed from the final round; empty when a handoff gate
    /// withheld them
    pub actions: Vec<ProposedAction>,
    /// Rounds completed
    pub rounds: u32,
}

impl ReviewOrchestrator {
    /// Run the session to completion.
    ///
    /// Idempotent over terminal states: calling `run` on a Done session
    /// returns the existing outcome without side effects. Calling it on a
    /// Stalled session first re-persists the pending round, then continues.
    pub async fn run(&mut self) -> Result<SessionOutcome> {
        match self.session.status {
            SessionStatus::Done => return self.outcome().await,
            SessionStatus::Stalled => self.resume().await?,
            SessionStatus::Planning => self.init().await?,
            SessionStatus::Active | SessionStatus::AwaitingDecision => {}
        }

        loop {
            if self.cancel.is_cancelled() {
                warn!(session_id = %self.session.id, "Session cancelled");
                return Err(Error::Cancelled);
            }
            match self.session.status {
                SessionStatus::Active => {
                    let round_no = self.session.round + 1;
                    let cancel = self.cancel.clone();
                    let record = tokio::select! {
                        record = self.run_round(round_no) => record?,
                        () = cancel.cancelled() => {
                            // Results of the abandoned round are discarded
                            warn!(session_id = %self.session.id, "Session cancelled mid-round");
                            return Err(Error::Cancelled);
                        }
                    };
                    self.session.pending_round = Some(record.clone());
                    self.persist(record).await?;
                }
                SessionStatus::AwaitingDecision => {
                    let decision = self
                        .session
                        .last_round()
                        .map(|r| r.decision)
                        .unwrap_or(RoundDecision::Stop);
                    match decision {
                        RoundDecision::Continue => {
                            self.session.transition(SessionStatus::Active)?;
                        }
                        RoundDecision::Stop => {
                            self.session.transition(SessionStatus::Done)?;
                            info!(
                                session_id = %self.session.id,
                                rounds = self.session.round,
                                verdict = ?self.session.verdict(),
                                "Session done"
                            );
                            return self.outcome().await;
                        }
                    }
                }
                // Unreachable in the loop; persist either advances to
                // AwaitingDecision or returns the stall error
                other => {
                    return Err(Error::Internal(format!(
                        "unexpected session status {other:?}"
                    )))
                }
            }
        }
    }

    /// INIT: load prior knowledge (degrading to empty on read failure) and
    /// activate the session
    async fn init(&mut self) -> Result<()> {
        let prior = match self.memory.load_prior(&self.session.change.target_ref).await {
            Ok(prior) => prior,
            Err(e) => {
                warn!(error = %e, "Prior knowledge unavailable, starting cold");
                PriorKnowledge::default()
            }
        };
        info!(
            session_id = %self.session.id,
            complexity = ?self.session.complexity,
            round_limit = self.session.round_limit,
            prior_rounds = prior.rounds.len(),
            "Session initialized"
        );
        self.prior = Arc::new(prior);
        self.session.transition(SessionStatus::Active)
    }

    /// PERSIST: write the round record with retries. Success seals it into
    /// the session; exhausted retries stall the session with the record
    /// kept as pending.
    async fn persist(&mut self, record: RoundRecord) -> Result<()> {
        let session_id = self.session.id;
        let write = retry_with_backoff(&self.config.persist_retry, || {
            let memory = Arc::clone(&self.memory);
            let record = record.clone();
            async move { memory.append_round(session_id, &record).await }
        })
        .await;

        match write {
            Ok(()) => {
                self.session.commit_round(record);
                self.session.transition(SessionStatus::AwaitingDecision)
            }
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    attempts = e.attempts,
                    error = %e.last_error,
                    "Round could not be persisted, stalling"
                );
                if self.session.status != SessionStatus::Stalled {
                    self.session.transition(SessionStatus::Stalled)?;
                }
                Err(Error::Persistence(format!(
                    "round {} not persisted after {} attempts: {}",
                    record.round, e.attempts, e.last_error
                )))
            }
        }
    }

    /// Resume a stalled session: re-persist the pending round, never
    /// re-run it
    async fn resume(&mut self) -> Result<()> {
        let Some(record) = self.session.pending_round.clone() else {
            // Stalled with nothing pending can only mean corrupted state
            return Err(Error::Internal(
                "stalled session has no pending round".to_string(),
            ));
        };
        info!(
            session_id = %self.session.id,
            round = record.round,
            "Resuming stalled session"
        );
        self.persist(record).await
    }

    /// Assemble the terminal outcome, consulting the handoff gate when
    /// enabled
    async fn outcome(&mut self) -> Result<SessionOutcome> {
        let actions = match self.session.last_round() {
            Some(record) => propose_actions(record),
            None => Vec::new(),
        };

        let actions = if self.config.handoff_enabled {
            match &self.handoff {
                Some(gate) if !gate.approve(&self.session, &actions).await? => {
                    info!(session_id = %self.session.id, "Handoff gate withheld actions");
                    Vec::new()
                }
                None => {
                    warn!(session_id = %self.session.id, "Handoff enabled but no gate attached");
                    Vec::new()
                }
                _ => actions,
            }
        } else {
            actions
        };

        Ok(SessionOutcome {
            verdict: self.session.verdict(),
            actions,
            rounds: self.session.round,
        })
    }
}
