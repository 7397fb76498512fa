//! Initial plan parameters

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::autodiff::{numel, Array};
use crate::error::{PlanResult, PlannerError};
use crate::random::RngKey;

/// Distribution of the unconstrained parameters at initialization
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Initializer {
    /// All zeros
    #[default]
    Zeros,
    /// Every parameter set to `value`
    Constant { value: f64 },
    /// Zero-mean Gaussian
    Normal { stddev: f64 },
    /// Uniform on `[low, high)`
    Uniform { low: f64, high: f64 },
}

impl Initializer {
    pub fn validate(&self) -> PlanResult<()> {
        match *self {
            Self::Zeros => Ok(()),
            Self::Constant { value } if value.is_finite() => Ok(()),
            Self::Normal { stddev } if stddev.is_finite() && stddev >= 0.0 => Ok(()),
            Self::Uniform { low, high } if low.is_finite() && high.is_finite() && low < high => {
                Ok(())
            }
            other => Err(PlannerError::Configuration(format!(
                "Invalid initializer: {:?}",
                other
            ))),
        }
    }

    /// Draw a parameter array of `shape` from `key`
    pub fn sample(&self, shape: &[usize], key: RngKey) -> Array {
        let n = numel(shape);
        let mut rng = key.rng();
        match *self {
            Self::Zeros => Array::zeros(shape),
            Self::Constant { value } => Array::filled(shape, value),
            Self::Normal { stddev } => match Normal::new(0.0, stddev) {
                Ok(normal) => {
                    let values = (0..n).map(|_| normal.sample(&mut rng)).collect();
                    Array::from_parts(shape.to_vec(), values).unwrap_or_else(|| Array::zeros(shape))
                }
                Err(_) => Array::zeros(shape),
            },
            Self::Uniform { low, high } if low < high => {
                let values = (0..n).map(|_| rng.gen_range(low..high)).collect();
                Array::from_parts(shape.to_vec(), values).unwrap_or_else(|| Array::zeros(shape))
            }
            Self::Uniform { low, .. } => Array::filled(shape, low),
        }
    }
}
