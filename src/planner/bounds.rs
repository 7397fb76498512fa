//! Bounds for action values
//!
//! Only finite, ordered intervals are kept; anything else is dropped with a
//! warning and the action is left unbounded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::autodiff::Dual;

/// Closed interval for one action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (inclusive)
    pub max: f64,
}

impl Bounds {
    /// Create new bounds; `None` unless both ends are finite and `min <= max`
    pub fn new(min: f64, max: f64) -> Option<Self> {
        (min.is_finite() && max.is_finite() && min <= max).then_some(Self { min, max })
    }

    /// Get the range (max - min)
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Denormalize a value from [0, 1] to bounds
    pub fn denormalize(&self, unit: &Dual) -> Dual {
        &Dual::constant(self.min) + &(unit * self.range())
    }
}

/// Per-action bounds, keyed by action name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionBounds {
    bounds: BTreeMap<String, Bounds>,
}

impl ActionBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `[min, max]` for `action`; returns false if the interval was dropped
    pub fn insert(&mut self, action: impl Into<String>, min: f64, max: f64) -> bool {
        let action = action.into();
        match Bounds::new(min, max) {
            Some(bounds) => {
                self.bounds.insert(action, bounds);
                true
            }
            None => {
                warn!(action = %action, min, max, "dropping non-finite or inverted action bounds");
                false
            }
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, action: impl Into<String>, min: f64, max: f64) -> Self {
        self.insert(action, min, max);
        self
    }

    pub fn get(&self, action: &str) -> Option<&Bounds> {
        self.bounds.get(action)
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bounds)> {
        self.bounds.iter().map(|(name, b)| (name.as_str(), b))
    }

    /// Drop every entry that is not a finite, ordered interval.
    ///
    /// Deserialized bounds bypass [`insert`](Self::insert), so they are
    /// re-checked here before use.
    pub fn retain_valid(&mut self) {
        self.bounds.retain(|action, b| {
            let keep = Bounds::new(b.min, b.max).is_some();
            if !keep {
                warn!(action = %action, min = b.min, max = b.max, "dropping non-finite or inverted action bounds");
            }
            keep
        });
    }
}

impl<S: Into<String>> FromIterator<(S, (f64, f64))> for ActionBounds {
    fn from_iter<I: IntoIterator<Item = (S, (f64, f64))>>(iter: I) -> Self {
        let mut bounds = Self::new();
        for (action, (min, max)) in iter {
            bounds.insert(action, min, max);
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_new() {
        let b = Bounds::new(-5.0, 5.0).unwrap();
        assert_eq!(b.min, -5.0);
        assert_eq!(b.max, 5.0);
        assert_eq!(b.range(), 10.0);
    }

    #[test]
    fn test_bounds_rejects_inverted_and_infinite() {
        assert!(Bounds::new(5.0, -5.0).is_none());
        assert!(Bounds::new(f64::NEG_INFINITY, 1.0).is_none());
        assert!(Bounds::new(0.0, f64::NAN).is_none());
        assert!(Bounds::new(2.0, 2.0).is_some());
    }

    #[test]
    fn test_bounds_denormalize() {
        let b = Bounds::new(2.0, 10.0).unwrap();
        assert_eq!(b.denormalize(&Dual::constant(0.0)).value(), 2.0);
        assert_eq!(b.denormalize(&Dual::constant(0.5)).value(), 6.0);
        assert_eq!(b.denormalize(&Dual::constant(1.0)).value(), 10.0);
        assert_eq!(b.denormalize(&Dual::variable(0.3, 0, 1)).grad(), &[8.0]);
    }

    #[test]
    fn test_action_bounds_from_pairs_filters() {
        let bounds: ActionBounds = vec![
            ("flow", (0.0, 10.0)),
            ("inverted", (1.0, 0.0)),
            ("open", (0.0, f64::INFINITY)),
        ]
        .into_iter()
        .collect();
        assert_eq!(bounds.len(), 1);
        assert_eq!(bounds.get("flow"), Bounds::new(0.0, 10.0).as_ref());
        assert!(bounds.get("inverted").is_none());
    }

    #[test]
    fn test_retain_valid_after_deserialize() {
        let json = r#"{"a":{"min":0.0,"max":1.0},"b":{"min":3.0,"max":1.0}}"#;
        let mut bounds: ActionBounds = serde_json::from_str(json).unwrap();
        assert_eq!(bounds.len(), 2);
        bounds.retain_valid();
        assert_eq!(bounds.len(), 1);
        assert!(bounds.get("a").is_some());
    }
}
