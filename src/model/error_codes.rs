//! Runtime anomaly codes
//!
//! Every compiled expression returns an [`ErrorCodes`] mask next to its
//! value. Masks only ever grow: they are combined with bitwise OR across
//! subexpressions, time steps and batch elements.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Bitmask of anomalies raised during a simulation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ErrorCodes: u32 {
        /// ln, sqrt or pow applied outside its domain
        const DOMAIN_VIOLATION = 1 << 0;
        const DIVISION_BY_ZERO = 1 << 1;
        /// Uniform with lower bound above upper bound
        const INVALID_PARAM_UNIFORM = 1 << 2;
        /// Normal with negative variance
        const INVALID_PARAM_NORMAL = 1 << 3;
        /// Exponential with non-positive scale
        const INVALID_PARAM_EXPONENTIAL = 1 << 4;
        const INVALID_PARAM_WEIBULL = 1 << 5;
        /// Bernoulli probability outside [0, 1]
        const INVALID_PARAM_BERNOULLI = 1 << 6;
        const INVALID_PARAM_POISSON = 1 << 7;
        const INVALID_PARAM_GAMMA = 1 << 8;
        /// Relaxed logical operand outside [0, 1]
        const INVALID_FUZZY_OPERAND = 1 << 9;
        const SHAPE_MISMATCH = 1 << 10;
    }
}

impl ErrorCodes {
    /// The "no anomaly" sentinel
    pub const NORMAL: Self = Self::empty();

    /// Set `flag` if `condition` holds
    pub fn when(condition: bool, flag: Self) -> Self {
        if condition {
            flag
        } else {
            Self::NORMAL
        }
    }

    /// True if no anomaly was recorded
    pub fn is_normal(self) -> bool {
        self.is_empty()
    }

    /// Human-readable names of every set bit, lowest bit first
    pub fn decode(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }

    /// OR-fold a sequence of masks
    pub fn accumulate<I: IntoIterator<Item = Self>>(codes: I) -> Self {
        codes.into_iter().fold(Self::NORMAL, |acc, c| acc | c)
    }
}
