//! First-order update rules
//!
//! Each rule keeps its moment accumulators in an [`OptimizerState`] laid
//! out over the plan's parameters in action-name order.

use serde::{Deserialize, Serialize};

use super::Plan;
use crate::error::{PlanResult, PlannerError};

/// Gradient descent update rule
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum GradientRule {
    /// Plain gradient descent
    Sgd { learning_rate: f64 },
    /// Heavy-ball momentum
    Momentum { learning_rate: f64, momentum: f64 },
    /// Adaptive moment estimation with bias correction
    Adam {
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    },
    /// Root-mean-square scaled descent
    RmsProp {
        learning_rate: f64,
        decay: f64,
        epsilon: f64,
    },
}

impl Default for GradientRule {
    fn default() -> Self {
        Self::adam(0.1)
    }
}

impl GradientRule {
    pub fn sgd(learning_rate: f64) -> Self {
        Self::Sgd { learning_rate }
    }

    pub fn momentum(learning_rate: f64, momentum: f64) -> Self {
        Self::Momentum {
            learning_rate,
            momentum,
        }
    }

    pub fn adam(learning_rate: f64) -> Self {
        Self::Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }

    pub fn rms_prop(learning_rate: f64) -> Self {
        Self::RmsProp {
            learning_rate,
            decay: 0.9,
            epsilon: 1e-8,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match *self {
            Self::Sgd { learning_rate }
            | Self::Momentum { learning_rate, .. }
            | Self::Adam { learning_rate, .. }
            | Self::RmsProp { learning_rate, .. } => learning_rate,
        }
    }

    /// Same rule with a different step size
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        match &mut self {
            Self::Sgd { learning_rate }
            | Self::Momentum { learning_rate, .. }
            | Self::Adam { learning_rate, .. }
            | Self::RmsProp { learning_rate, .. } => *learning_rate = lr,
        }
        self
    }

    pub fn validate(&self) -> PlanResult<()> {
        let lr = self.learning_rate();
        if !(lr.is_finite() && lr > 0.0) {
            return Err(PlannerError::Configuration(format!(
                "Learning rate must be positive and finite, got {}",
                lr
            )));
        }
        let unit = |name: &str, v: f64| {
            if (0.0..1.0).contains(&v) {
                Ok(())
            } else {
                Err(PlannerError::Configuration(format!(
                    "{} must lie in [0, 1), got {}",
                    name, v
                )))
            }
        };
        match *self {
            Self::Sgd { .. } => Ok(()),
            Self::Momentum { momentum, .. } => unit("Momentum", momentum),
            Self::Adam { beta1, beta2, .. } => {
                unit("beta1", beta1)?;
                unit("beta2", beta2)
            }
            Self::RmsProp { decay, .. } => unit("Decay", decay),
        }
    }

    /// Fresh accumulators for a plan
    pub fn init(&self, plan: &Plan) -> OptimizerState {
        let n = plan.values().map(|a| a.len()).sum();
        OptimizerState {
            step: 0,
            first: vec![0.0; n],
            second: vec![0.0; n],
        }
    }

    /// Descend one step along `grads`, in place
    pub fn apply(&self, plan: &mut Plan, grads: &Plan, state: &mut OptimizerState) {
        state.step += 1;
        let t = state.step as i32;
        let mut offset = 0;
        for (name, params) in plan.iter_mut() {
            let len = params.len();
            let Some(grad) = grads.get(name) else {
                offset += len;
                continue;
            };
            for (i, (x, g)) in params
                .values_mut()
                .iter_mut()
                .zip(grad.values())
                .enumerate()
            {
                let k = offset + i;
                let (Some(m), Some(v)) = (state.first.get_mut(k), state.second.get_mut(k)) else {
                    continue;
                };
                *x -= self.delta(*g, m, v, t);
            }
            offset += len;
        }
    }

    fn delta(&self, g: f64, m: &mut f64, v: &mut f64, t: i32) -> f64 {
        match *self {
            Self::Sgd { learning_rate } => learning_rate * g,
            Self::Momentum {
                learning_rate,
                momentum,
            } => {
                *m = momentum * *m + g;
                learning_rate * *m
            }
            Self::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / (1.0 - beta1.powi(t));
                let v_hat = *v / (1.0 - beta2.powi(t));
                learning_rate * m_hat / (v_hat.sqrt() + epsilon)
            }
            Self::RmsProp {
                learning_rate,
                decay,
                epsilon,
            } => {
                *v = decay * *v + (1.0 - decay) * g * g;
                learning_rate * g / (v.sqrt() + epsilon)
            }
        }
    }
}

/// Moment accumulators of a [`GradientRule`], one slot per plan parameter
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    /// Number of updates applied
    pub step: u64,
    pub first: Vec<f64>,
    pub second: Vec<f64>,
}
