//! Plan optimization
//!
//! This module contains the action projection, plan initializers, gradient
//! update rules and the [`BackpropPlanner`] that ties them to the relaxed
//! rollout engine.

pub mod aggregation;
pub mod backprop;
pub mod bounds;
pub mod config;
pub mod initializer;
pub mod optimizer;
pub mod projection;
pub mod record;

use std::collections::BTreeMap;

use crate::autodiff::Array;

/// Plan parameters per action, each shaped `[horizon, *action shape]`
pub type Plan = BTreeMap<String, Array>;

pub use aggregation::ReturnAggregation;
pub use backprop::{BackpropPlanner, LossEvaluation, Optimize, PlannerBuilder};
pub use bounds::{ActionBounds, Bounds};
pub use config::PlannerConfig;
pub use initializer::Initializer;
pub use optimizer::{GradientRule, OptimizerState};
pub use projection::{ActionDomain, Projection};
pub use record::EpochRecord;

pub mod prelude {
    pub use super::{
        ActionBounds, BackpropPlanner, EpochRecord, GradientRule, Initializer, Plan,
        PlannerConfig, ReturnAggregation,
    };
}
