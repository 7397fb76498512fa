//! Per-epoch progress snapshots

use std::collections::BTreeMap;

use serde::Serialize;

use super::Plan;
use crate::autodiff::Array;
use crate::error::PlanResult;
use crate::model::ErrorCodes;

/// Snapshot yielded by [`Optimize`](super::Optimize) after every epoch
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EpochRecord {
    /// Zero-based epoch index
    pub epoch: usize,
    /// Projected plan after this epoch's update
    pub plan: Plan,
    /// Projected plan with the lowest loss so far
    pub best_plan: Plan,
    pub loss: f64,
    pub best_loss: f64,
    /// Final bindings of the loss recomputation, with a leading batch axis
    pub rollouts: BTreeMap<String, Array>,
    pub error_codes: ErrorCodes,
    /// Names of the anomalies in `error_codes`
    pub errors: Vec<&'static str>,
}

impl EpochRecord {
    /// Serialize for logging or persistence by the caller
    pub fn to_json(&self) -> PlanResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
