//! Error types for relaxplan
//!
//! This module defines the fatal error tiers used throughout the library.
//! Runtime anomalies during simulation are never errors: they are recorded
//! in [`ErrorCodes`](crate::model::ErrorCodes) bitmasks instead.

use thiserror::Error;

/// Error type for malformed domain descriptions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Two fluents share a name
    #[error("Duplicate fluent: {0}")]
    DuplicateFluent(String),

    /// A state, derived or interm fluent has no update expression
    #[error("Missing CPF for fluent {0}")]
    MissingCpf(String),

    /// A CPF is keyed by a name that no fluent accepts
    #[error("Unexpected CPF {0}: no state, derived or interm fluent takes it")]
    UnexpectedCpf(String),

    /// Default values do not fit the declared shape
    #[error("Fluent {name} has {actual} default values, expected 1 or {expected}")]
    DefaultMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// The description could not be parsed
    #[error("Malformed domain description: {0}")]
    Malformed(String),
}

/// Error type for compilation of symbolic expressions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// A construct has no differentiable counterpart
    #[error("Construct not implemented: {construct} at {location}")]
    NotImplemented { construct: String, location: String },

    /// Reference to a name that is neither a fluent nor a CPF
    #[error("Unknown variable {name} at {location}")]
    UnknownVariable { name: String, location: String },

    /// Wrong number of arguments for an operator
    #[error("Operator {op} expects {expected} argument(s), got {actual} at {location}")]
    ArityMismatch {
        op: String,
        expected: String,
        actual: usize,
        location: String,
    },

    /// Operator not valid for this node kind
    #[error("Invalid operator {op} at {location}")]
    InvalidOperator { op: String, location: String },

    /// Operand shapes cannot be broadcast together
    #[error("Shape mismatch at {location}: {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        lhs: Vec<usize>,
        rhs: Vec<usize>,
        location: String,
    },

    /// Reduction axis out of range for the operand rank
    #[error("Axis {axis} out of range for rank {rank} at {location}")]
    InvalidAxis {
        axis: usize,
        rank: usize,
        location: String,
    },

    /// CPFs reference each other in a cycle
    #[error("Cyclic dependency between CPFs: {0}")]
    CyclicDependency(String),

    /// The reward expression must evaluate to a scalar
    #[error("Reward must be scalar, got shape {0:?}")]
    NonScalarReward(Vec<usize>),
}

/// Top-level error type for planner operations
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Compile error
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for compilation
pub type CompileResult<T> = Result<T, CompileError>;

/// Result type alias for planner operations
pub type PlanResult<T> = Result<T, PlannerError>;
