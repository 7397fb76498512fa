//! Splittable randomness state
//!
//! Every stochastic operator receives an [`RngKey`] and returns an updated
//! one. Keys are split deterministically, so identical seeds and identical
//! call orders reproduce identical samples, including across batched
//! rollouts that run on different threads.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Opaque, splittable randomness token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RngKey(u64);

impl RngKey {
    /// Create a key from a seed
    pub fn new(seed: u64) -> Self {
        Self(mix(seed))
    }

    /// Derive the key for sub-stream `index` without consuming `self`
    pub fn fold_in(self, index: u64) -> Self {
        Self(mix(self.0 ^ mix(index.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA))))
    }

    /// Split into a successor key and an independent sub-key
    pub fn split(self) -> (Self, Self) {
        (self.fold_in(0), self.fold_in(1))
    }

    /// Split into `n` independent keys
    pub fn split_n(self, n: usize) -> Vec<Self> {
        (0..n as u64).map(|i| self.fold_in(i)).collect()
    }

    /// Materialize a generator for a single sampling site
    pub fn rng(self) -> StdRng {
        StdRng::seed_from_u64(self.0)
    }

    /// Raw key bits
    pub fn bits(self) -> u64 {
        self.0
    }
}

impl Default for RngKey {
    fn default() -> Self {
        Self::new(0)
    }
}

/// SplitMix64 finalizer
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

pub mod prelude {
    pub use super::RngKey;
}
