//! Reduction of a batch of returns to one scalar

use serde::{Deserialize, Serialize};

use crate::autodiff::Dual;

/// How sampled returns are combined before negation into a loss
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnAggregation {
    #[default]
    Mean,
    Sum,
    Min,
    Max,
}

impl ReturnAggregation {
    pub fn apply(self, returns: &[Dual]) -> Dual {
        let sum = || returns.iter().fold(Dual::constant(0.0), |acc, r| &acc + r);
        match self {
            Self::Sum => sum(),
            Self::Mean if returns.is_empty() => Dual::constant(0.0),
            Self::Mean => &sum() * (1.0 / returns.len() as f64),
            Self::Min => returns
                .split_first()
                .map(|(first, rest)| rest.iter().fold(first.clone(), |acc, r| acc.min(r)))
                .unwrap_or_default(),
            Self::Max => returns
                .split_first()
                .map(|(first, rest)| rest.iter().fold(first.clone(), |acc, r| acc.max(r)))
                .unwrap_or_default(),
        }
    }
}
