//! Domain descriptions
//!
//! A [`Domain`] is the immutable input to the planner: typed fluents with
//! their initial values, one CPF per state/derived/interm fluent, and a
//! reward expression. State fluent `s` is updated by the CPF keyed `s'`.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::expr::Expr;
use crate::autodiff::{numel, Array, Tensor};
use crate::error::DomainError;

/// Suffix that marks the next-state counterpart of a state fluent
pub const PRIME: char = '\'';

/// Value domain of a fluent
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    Real,
    /// Object-valued, carried as a real-valued index
    Object(String),
}

/// Role of a fluent in the transition model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FluentKind {
    State,
    Action,
    Derived,
    Interm,
    NonFluent,
}

/// A typed, possibly object-indexed variable
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fluent {
    pub name: String,
    pub kind: FluentKind,
    pub range: ValueType,
    /// Object-parameter arity; empty for scalars
    #[serde(default)]
    pub shape: Vec<usize>,
    /// One value broadcast to the shape, or one value per element
    #[serde(default)]
    pub default: Vec<f64>,
}

impl Fluent {
    pub fn new(name: impl Into<String>, kind: FluentKind, range: ValueType) -> Self {
        Self {
            name: name.into(),
            kind,
            range,
            shape: Vec::new(),
            default: Vec::new(),
        }
    }

    pub fn state(name: impl Into<String>, range: ValueType, default: f64) -> Self {
        Self::new(name, FluentKind::State, range).with_default(vec![default])
    }

    pub fn action(name: impl Into<String>, range: ValueType) -> Self {
        Self::new(name, FluentKind::Action, range)
    }

    pub fn non_fluent(name: impl Into<String>, range: ValueType, default: f64) -> Self {
        Self::new(name, FluentKind::NonFluent, range).with_default(vec![default])
    }

    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_default(mut self, default: Vec<f64>) -> Self {
        self.default = default;
        self
    }

    /// Name of the next-state counterpart
    pub fn primed_name(&self) -> String {
        format!("{}{}", self.name, PRIME)
    }

    /// Initial value as a plain array
    pub fn initial_value(&self) -> Array {
        match self.default.len() {
            0 => Array::zeros(&self.shape),
            1 => Array::filled(&self.shape, self.default[0]),
            _ => Array::from_parts(self.shape.clone(), self.default.clone())
                .unwrap_or_else(|| Array::zeros(&self.shape)),
        }
    }

    /// Initial value as a constant tensor
    pub fn initial_tensor(&self) -> Tensor {
        Tensor::from_array(&self.initial_value())
    }
}

/// Parsed domain and instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub fluents: Vec<Fluent>,
    pub cpfs: BTreeMap<String, Expr>,
    pub reward: Expr,
}

impl Domain {
    pub fn new(name: impl Into<String>, reward: Expr) -> Self {
        Self {
            name: name.into(),
            fluents: Vec::new(),
            cpfs: BTreeMap::new(),
            reward,
        }
    }

    pub fn with_fluent(mut self, fluent: Fluent) -> Self {
        self.fluents.push(fluent);
        self
    }

    pub fn with_cpf(mut self, name: impl Into<String>, expr: Expr) -> Self {
        self.cpfs.insert(name.into(), expr);
        self
    }

    /// Look up a fluent by name
    pub fn fluent(&self, name: &str) -> Option<&Fluent> {
        self.fluents.iter().find(|f| f.name == name)
    }

    pub fn fluents_of(&self, kind: FluentKind) -> impl Iterator<Item = &Fluent> {
        self.fluents.iter().filter(move |f| f.kind == kind)
    }

    pub fn action_fluents(&self) -> impl Iterator<Item = &Fluent> {
        self.fluents_of(FluentKind::Action)
    }

    /// `(primed, unprimed)` pairs for every state fluent
    pub fn primed_to_unprimed(&self) -> Vec<(String, String)> {
        self.fluents_of(FluentKind::State)
            .map(|f| (f.primed_name(), f.name.clone()))
            .collect()
    }

    /// Check the structural invariants of the description
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        for fluent in &self.fluents {
            if !seen.insert(fluent.name.as_str()) {
                return Err(DomainError::DuplicateFluent(fluent.name.clone()));
            }
            let expected = numel(&fluent.shape);
            let actual = fluent.default.len();
            if actual > 1 && actual != expected {
                return Err(DomainError::DefaultMismatch {
                    name: fluent.name.clone(),
                    expected,
                    actual,
                });
            }
        }

        let mut accepted = HashSet::new();
        for fluent in &self.fluents {
            let key = match fluent.kind {
                FluentKind::State => fluent.primed_name(),
                FluentKind::Derived | FluentKind::Interm => fluent.name.clone(),
                FluentKind::Action | FluentKind::NonFluent => continue,
            };
            if !self.cpfs.contains_key(&key) {
                return Err(DomainError::MissingCpf(fluent.name.clone()));
            }
            accepted.insert(key);
        }
        if let Some(extra) = self.cpfs.keys().find(|k| !accepted.contains(*k)) {
            return Err(DomainError::UnexpectedCpf(extra.clone()));
        }
        Ok(())
    }

    /// Parse a JSON description and validate it
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        let domain: Self =
            serde_json::from_str(json).map_err(|e| DomainError::Malformed(e.to_string()))?;
        domain.validate()?;
        Ok(domain)
    }

    pub fn to_json(&self) -> Result<String, DomainError> {
        serde_json::to_string_pretty(self).map_err(|e| DomainError::Malformed(e.to_string()))
    }
}
