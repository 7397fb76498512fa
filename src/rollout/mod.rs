//! Rollout engine
//!
//! Threads compiled CPFs and reward across a fixed horizon. A single
//! trajectory is a strict sequential fold over time steps; a batch is an
//! independent map over trajectories that share one plan, each with its
//! own split of the randomness key.

use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::trace;

use crate::autodiff::{Array, Dual, Tensor};
use crate::compiler::{Bindings, CompiledModel};
use crate::model::ErrorCodes;
use crate::random::RngKey;

/// State carried from one step to the next
#[derive(Clone, Debug)]
pub struct Carry {
    pub bindings: Bindings,
    pub key: RngKey,
    pub errors: ErrorCodes,
}

/// One simulated trajectory
#[derive(Clone, Debug)]
pub struct Trajectory {
    /// Reward of every step
    pub rewards: Vec<Dual>,
    /// Sum of `rewards`
    pub total: Dual,
    /// Bindings after the last step
    pub bindings: Bindings,
    /// Key after the last step
    pub key: RngKey,
    /// OR of every error raised along the trajectory
    pub errors: ErrorCodes,
}

/// Trajectories of one batch, in batch order
#[derive(Clone, Debug)]
pub struct BatchedRollout {
    pub returns: Vec<Dual>,
    pub bindings: Vec<Bindings>,
    /// Final key of the last batch element
    pub key: RngKey,
    pub errors: Vec<ErrorCodes>,
}

impl BatchedRollout {
    /// OR of the errors of every batch element
    pub fn error_union(&self) -> ErrorCodes {
        ErrorCodes::accumulate(self.errors.iter().copied())
    }

    /// Forward values of the final bindings, stacked on a leading batch axis
    pub fn stacked_bindings(&self) -> BTreeMap<String, Array> {
        let Some(first) = self.bindings.first() else {
            return BTreeMap::new();
        };
        first
            .keys()
            .filter_map(|name| {
                let per_element: Vec<Array> = self
                    .bindings
                    .iter()
                    .filter_map(|b| b.get(name).map(Tensor::to_array))
                    .collect();
                Array::stack(&per_element).map(|stacked| (name.clone(), stacked))
            })
            .collect()
    }
}

/// Split a `[horizon, *shape]` action map into one binding set per step
pub fn time_slices(actions: &BTreeMap<String, Tensor>, horizon: usize) -> Vec<Bindings> {
    (0..horizon)
        .map(|t| {
            actions
                .iter()
                .filter_map(|(name, plan)| plan.index_first(t).map(|slice| (name.clone(), slice)))
                .collect()
        })
        .collect()
}

/// Runs a compiled model forward in time
#[derive(Clone, Debug)]
pub struct Simulator {
    model: CompiledModel,
    parallel: bool,
}

impl Simulator {
    pub fn new(model: CompiledModel) -> Self {
        Self {
            model,
            parallel: cfg!(feature = "parallel"),
        }
    }

    /// Evaluate batch elements on the rayon pool (ignored without the `parallel` feature)
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn model(&self) -> &CompiledModel {
        &self.model
    }

    /// Initial bindings with every primed state set to its current value
    pub fn initial_bindings(&self) -> Bindings {
        let mut bindings = self.model.init.clone();
        for (primed, unprimed) in &self.model.primed_to_unprimed {
            if let Some(value) = bindings.get(unprimed).cloned() {
                bindings.insert(primed.clone(), value);
            }
        }
        bindings
    }

    /// Advance one time step under `actions`, returning the step reward
    pub fn step(&self, carry: Carry, actions: &Bindings) -> (Carry, Dual) {
        let Carry {
            mut bindings,
            mut key,
            mut errors,
        } = carry;

        for (name, value) in actions {
            bindings.insert(name.clone(), value.clone());
        }

        for (name, cpf) in &self.model.cpfs {
            let (value, next, err) = cpf(&bindings, key);
            key = next;
            errors |= err;
            bindings.insert(name.clone(), value);
        }

        let (reward, next, err) = (self.model.reward)(&bindings, key);
        key = next;
        errors |= err;

        for (primed, unprimed) in &self.model.primed_to_unprimed {
            if let Some(value) = bindings.get(primed).cloned() {
                bindings.insert(unprimed.clone(), value);
            }
        }

        let carry = Carry {
            bindings,
            key,
            errors,
        };
        (carry, reward.item())
    }

    /// Simulate one trajectory over every step of `actions`
    pub fn rollout(&self, init: &Bindings, actions: &[Bindings], key: RngKey) -> Trajectory {
        let mut carry = Carry {
            bindings: init.clone(),
            key,
            errors: ErrorCodes::NORMAL,
        };
        let mut rewards = Vec::with_capacity(actions.len());
        for slice in actions {
            let (next, reward) = self.step(carry, slice);
            carry = next;
            rewards.push(reward);
        }
        let total = rewards
            .iter()
            .fold(Dual::constant(0.0), |acc, r| &acc + r);
        Trajectory {
            rewards,
            total,
            bindings: carry.bindings,
            key: carry.key,
            errors: carry.errors,
        }
    }

    /// Simulate `batch_size` independent trajectories under the same actions
    pub fn batched_rollout(
        &self,
        init: &Bindings,
        actions: &[Bindings],
        key: RngKey,
        batch_size: usize,
    ) -> BatchedRollout {
        let keys = key.split_n(batch_size);
        let trajectories = self.map_batch(&keys, |k| self.rollout(init, actions, k));

        let key = trajectories.last().map(|t| t.key).unwrap_or(key);
        let mut batch = BatchedRollout {
            returns: Vec::with_capacity(batch_size),
            bindings: Vec::with_capacity(batch_size),
            key,
            errors: Vec::with_capacity(batch_size),
        };
        for trajectory in trajectories {
            batch.returns.push(trajectory.total);
            batch.bindings.push(trajectory.bindings);
            batch.errors.push(trajectory.errors);
        }
        trace!(batch = batch_size, errors = ?batch.error_union(), "batched rollout");
        batch
    }

    #[cfg(feature = "parallel")]
    fn map_batch<F>(&self, keys: &[RngKey], f: F) -> Vec<Trajectory>
    where
        F: Fn(RngKey) -> Trajectory + Sync + Send,
    {
        if self.parallel {
            keys.par_iter().map(|k| f(*k)).collect()
        } else {
            keys.iter().map(|k| f(*k)).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn map_batch<F>(&self, keys: &[RngKey], f: F) -> Vec<Trajectory>
    where
        F: Fn(RngKey) -> Trajectory,
    {
        keys.iter().map(|k| f(*k)).collect()
    }
}

pub mod prelude {
    pub use super::{time_slices, BatchedRollout, Simulator, Trajectory};
}
