//! Model pools and selection
//!
//! Models are grouped into tiers; a selection policy picks one candidate per
//! agent. Selection never fails: an empty probe result or an unreachable
//! probe degrades to the last candidate in the pool.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Tier of a model pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolTier {
    /// Cheap models for code analysis
    CheapCoding,
    /// Expensive models for code analysis
    ExpensiveCoding,
    /// Cheap models for tool-driven retrieval
    CheapToolUse,
    /// Expensive models for tool-driven retrieval
    ExpensiveToolUse,
    /// Models for the orchestrator itself
    Orchestrator,
}

/// Policy for picking a model out of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Always the first candidate
    Fixed,
    /// Uniform random candidate
    Random,
    /// First candidate the availability probe confirms; last candidate
    /// when none are confirmed
    BestAvailable,
}

/// Probe for model availability, consulted by the best-available policy
#[async_trait]
pub trait AvailabilityProbe: Send + Sync {
    /// Whether the model is currently usable
    async fn is_available(&self, model_id: &str) -> bool;
}

/// A probe that reports everything available
pub struct AlwaysAvailable;

#[async_trait]
impl AvailabilityProbe for AlwaysAvailable {
    async fn is_available(&self, _model_id: &str) -> bool {
        true
    }
}

/// Registry of model pools keyed by tier
pub struct ModelPoolRegistry {
    pools: HashMap<PoolTier, Vec<String>>,
    probe: Box<dyn AvailabilityProbe>,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for ModelPoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPoolRegistry")
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}

impl Default for ModelPoolRegistry {
    fn default() -> Self {
        let mut pools = HashMap::new();
        pools.insert(
            PoolTier::CheapCoding,
            vec![
                "haiku-fast".to_string(),
                "mini-coder".to_string(),
                "flash-lite".to_string(),
            ],
        );
        pools.insert(
            PoolTier::ExpensiveCoding,
            vec![
                "opus-deep".to_string(),
                "sonnet-pro".to_string(),
                "gpt-large".to_string(),
            ],
        );
        pools.insert(
            PoolTier::CheapToolUse,
            vec!["haiku-tools".to_string(), "mini-tools".to_string()],
        );
        pools.insert(
            PoolTier::ExpensiveToolUse,
            vec!["sonnet-tools".to_string(), "gpt-tools".to_string()],
        );
        pools.insert(
            PoolTier::Orchestrator,
            vec!["sonnet-orchestrator".to_string()],
        );
        Self {
            pools,
            probe: Box::new(AlwaysAvailable),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl ModelPoolRegistry {
    /// Create a registry with the default pools
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the availability probe
    #[must_use]
    pub fn with_probe(mut self, probe: Box<dyn AvailabilityProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Seed the RNG used by the random policy
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Replace the candidates for a tier
    #[must_use]
    pub fn with_pool(mut self, tier: PoolTier, models: Vec<String>) -> Self {
        self.pools.insert(tier, models);
        self
    }

    /// Candidates for a tier
    #[must_use]
    pub fn pool(&self, tier: PoolTier) -> &[String] {
        self.pools.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Select a model for a role. Falls back to a fixed placeholder id when
    /// the tier has no candidates at all, so callers never handle an error.
    pub async fn select(&self, role: &str, tier: PoolTier, policy: SelectionPolicy) -> String {
        let candidates = self.pool(tier);
        let Some(last) = candidates.last() else {
            warn!(role, ?tier, "model pool is empty, using placeholder");
            return "unpooled-default".to_string();
        };

        let selected = match policy {
            SelectionPolicy::Fixed => candidates[0].clone(),
            SelectionPolicy::Random => {
                let idx = match self.rng.lock() {
                    Ok(mut rng) => rng.gen_range(0..candidates.len()),
                    Err(_) => 0,
                };
                candidates[idx].clone()
            }
            SelectionPolicy::BestAvailable => {
                let mut choice = None;
                for candidate in candidates {
                    if self.probe.is_available(candidate).await {
                        choice = Some(candidate.clone());
                        break;
                    }
                }
                // Nothing confirmed available: take the last candidate
                choice.unwrap_or_else(|| last.clone())
            }
        };

        debug!(role, ?tier, ?policy, model = %selected, "Selected model");
        selected
    }
}
