//! Engine configuration
//!
//! Everything tunable about a review session: model selection mode, round
//! limits per complexity, the quality-gate threshold, iteration budgeting,
//! timeouts, and persistence retry behavior. All fields carry serde defaults
//! so a partial config file deserializes into a working engine.

use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};

/// Model selection mode for the whole session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Cheap model tiers
    Simple,
    /// Expensive model tiers
    Advanced,
}

/// How specialist iteration budgets reset between rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationBudgetMode {
    /// Budget resets every round; a separate session cap bounds the total
    PerRound,
    /// Budget is spent once across the whole session
    Cumulative,
}

/// Iteration budgeting for specialists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistBudgets {
    /// Budget mode
    #[serde(default = "default_budget_mode")]
    pub mode: IterationBudgetMode,
    /// Hard cap on iterations per specialist over the whole session,
    /// applied in per-round mode
    #[serde(default = "default_session_iteration_cap")]
    pub session_iteration_cap: u32,
}

/// Round limits keyed by change complexity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundLimits {
    /// Limit for simple changes
    #[serde(default = "default_simple_rounds")]
    pub simple: u32,
    /// Limit for medium changes
    #[serde(default = "default_medium_rounds")]
    pub medium: u32,
    /// Limit for complex changes
    #[serde(default = "default_complex_rounds")]
    pub complex: u32,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model selection mode
    #[serde(default = "default_mode")]
    pub mode: SelectionMode,
    /// Round limits per complexity
    #[serde(default)]
    pub round_limits: RoundLimits,
    /// Quality-gate threshold; a round at or above it triggers another round
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    /// Probability of a random roster perturbation per round (0.0 - 1.0)
    #[serde(default)]
    pub exploration_rate: f64,
    /// Whether the handoff gate runs before terminal actions
    #[serde(default)]
    pub handoff_enabled: bool,
    /// Specialist iteration budgeting
    #[serde(default)]
    pub budgets: SpecialistBudgets,
    /// Retry behavior for memory-store writes
    #[serde(default)]
    pub persist_retry: RetryConfig,
    /// Wall-clock budget for one specialist round, in seconds
    #[serde(default = "default_specialist_timeout_secs")]
    pub specialist_timeout_secs: u64,
    /// Wall-clock budget for one context worker, in seconds
    #[serde(default = "default_context_timeout_secs")]
    pub context_timeout_secs: u64,
    /// Seed for roster exploration; random when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
    /// Configuration variant label recorded on sessions
    #[serde(default = "default_variant")]
    pub variant: String,
}

fn default_mode() -> SelectionMode {
    SelectionMode::Simple
}

fn default_budget_mode() -> IterationBudgetMode {
    IterationBudgetMode::PerRound
}

fn default_session_iteration_cap() -> u32 {
    8
}

fn default_simple_rounds() -> u32 {
    1
}

fn default_medium_rounds() -> u32 {
    2
}

fn default_complex_rounds() -> u32 {
    3
}

fn default_score_threshold() -> f64 {
    3.0
}

fn default_specialist_timeout_secs() -> u64 {
    300
}

fn default_context_timeout_secs() -> u64 {
    60
}

fn default_variant() -> String {
    "default".to_string()
}

impl Default for SpecialistBudgets {
    fn default() -> Self {
        Self {
            mode: default_budget_mode(),
            session_iteration_cap: default_session_iteration_cap(),
        }
    }
}

impl Default for RoundLimits {
    fn default() -> Self {
        Self {
            simple: default_simple_rounds(),
            medium: default_medium_rounds(),
            complex: default_complex_rounds(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            round_limits: RoundLimits::default(),
            score_threshold: default_score_threshold(),
            exploration_rate: 0.0,
            handoff_enabled: false,
            budgets: SpecialistBudgets::default(),
            persist_retry: RetryConfig::default(),
            specialist_timeout_secs: default_specialist_timeout_secs(),
            context_timeout_secs: default_context_timeout_secs(),
            rng_seed: None,
            variant: default_variant(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the selection mode
    #[must_use]
    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the quality-gate threshold
    #[must_use]
    pub fn with_score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Set the exploration rate
    #[must_use]
    pub fn with_exploration_rate(mut self, rate: f64) -> Self {
        self.exploration_rate = rate;
        self
    }

    /// Enable the handoff gate
    #[must_use]
    pub fn with_handoff_enabled(mut self, enabled: bool) -> Self {
        self.handoff_enabled = enabled;
        self
    }

    /// Set round limits
    #[must_use]
    pub fn with_round_limits(mut self, limits: RoundLimits) -> Self {
        self.round_limits = limits;
        self
    }

    /// Set the RNG seed for deterministic roster exploration
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Set the variant label
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.exploration_rate) {
            return Err(Error::Configuration(format!(
                "exploration_rate must be in [0.0, 1.0], got {}",
                self.exploration_rate
            )));
        }
        if self.score_threshold < 0.0 {
            return Err(Error::Configuration(format!(
                "score_threshold must be non-negative, got {}",
                self.score_threshold
            )));
        }
        if self.round_limits.simple == 0
            || self.round_limits.medium == 0
            || self.round_limits.complex == 0
        {
            return Err(Error::Configuration(
                "round limits must be at least 1".to_string(),
            ));
        }
        if self.budgets.session_iteration_cap == 0 {
            return Err(Error::Configuration(
                "session_iteration_cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
