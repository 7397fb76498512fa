//! Action projection
//!
//! Maps unconstrained plan parameters into each action's legal domain.
//! Boolean actions are squashed into (0, 1) and read as fuzzy truth values;
//! integer and object actions are carried as reals; bounded non-boolean
//! actions are squashed and rescaled into their interval. The mapping is
//! total and never fails.

use std::collections::BTreeMap;

use super::bounds::{ActionBounds, Bounds};
use crate::autodiff::{Dual, Tensor};
use crate::model::{Domain, ValueType};

/// Legal domain of one action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDomain {
    pub range: ValueType,
    pub bounds: Option<Bounds>,
}

impl ActionDomain {
    /// Project one unconstrained parameter
    pub fn project(&self, x: &Dual) -> Dual {
        match (&self.range, self.bounds) {
            (ValueType::Bool, _) => x.sigmoid(),
            (_, Some(bounds)) => bounds.denormalize(&x.sigmoid()),
            (_, None) => x.clone(),
        }
    }

    /// Snap a projected value to what an environment would accept
    pub fn discretize(&self, value: f64) -> f64 {
        match self.range {
            ValueType::Bool => {
                if value > 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            ValueType::Int | ValueType::Object(_) => value.round(),
            ValueType::Real => value,
        }
    }
}

/// Projection for every action of a domain
#[derive(Debug, Clone, Default)]
pub struct Projection {
    actions: BTreeMap<String, ActionDomain>,
}

impl Projection {
    pub fn new(domain: &Domain, bounds: &ActionBounds) -> Self {
        let actions = domain
            .action_fluents()
            .map(|fluent| {
                let action = ActionDomain {
                    range: fluent.range.clone(),
                    bounds: bounds.get(&fluent.name).copied(),
                };
                (fluent.name.clone(), action)
            })
            .collect();
        Self { actions }
    }

    pub fn domain_of(&self, action: &str) -> Option<&ActionDomain> {
        self.actions.get(action)
    }

    /// Project every action tensor; unknown names pass through unchanged
    pub fn project(&self, plan: &BTreeMap<String, Tensor>) -> BTreeMap<String, Tensor> {
        plan.iter()
            .map(|(name, raw)| {
                let projected = match self.actions.get(name) {
                    Some(action) => raw.map(|x| action.project(x)),
                    None => raw.clone(),
                };
                (name.clone(), projected)
            })
            .collect()
    }

    /// Project and then discretize every action tensor
    pub fn project_discrete(&self, plan: &BTreeMap<String, Tensor>) -> BTreeMap<String, Tensor> {
        self.project(plan)
            .into_iter()
            .map(|(name, projected)| {
                let snapped = match self.actions.get(&name) {
                    Some(action) => {
                        projected.map(|x| Dual::constant(action.discretize(x.value())))
                    }
                    None => projected,
                };
                (name, snapped)
            })
            .collect()
    }
}
