//! Planner configuration

use serde::{Deserialize, Serialize};

use super::aggregation::ReturnAggregation;
use super::bounds::ActionBounds;
use super::initializer::Initializer;
use super::optimizer::GradientRule;
use crate::error::{PlanResult, PlannerError};
use crate::logic::FuzzyLogic;

/// Configuration for the backprop planner
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Number of decision steps in a plan
    pub horizon: usize,
    /// Trajectories sampled per loss evaluation
    pub batch_size: usize,
    /// Seed of the root randomness key
    pub seed: u64,
    /// Optional finite bounds per action
    pub action_bounds: ActionBounds,
    pub initializer: Initializer,
    pub optimizer: GradientRule,
    pub aggregation: ReturnAggregation,
    pub logic: FuzzyLogic,
    /// Whether to simulate batch elements in parallel
    pub parallel: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            horizon: 10,
            batch_size: 32,
            seed: 42,
            action_bounds: ActionBounds::default(),
            initializer: Initializer::default(),
            optimizer: GradientRule::default(),
            aggregation: ReturnAggregation::default(),
            logic: FuzzyLogic::default(),
            parallel: true,
        }
    }
}

impl PlannerConfig {
    /// Check every field; also drops invalid action bounds
    pub fn validate(&mut self) -> PlanResult<()> {
        if self.horizon == 0 {
            return Err(PlannerError::Configuration(
                "Horizon must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(PlannerError::Configuration(
                "Batch size must be at least 1".to_string(),
            ));
        }
        self.initializer.validate()?;
        self.optimizer.validate()?;
        self.action_bounds.retain_valid();
        Ok(())
    }
}
