//! Session orchestrator
//!
//! Drives a review session end to end: classify the change, load prior
//! knowledge, run bounded quality-gated rounds of specialist review, persist
//! every round before acting on it, and propose terminal actions. Split
//! into construction ([`core`]), the per-round engine ([`rounds`]), and the
//! session state machine ([`lifecycle`]).

mod core;
mod lifecycle;
mod rounds;


pub use core::ReviewOrchestrator;
pub use lifecycle::{HandoffGate, SessionOutcome};
