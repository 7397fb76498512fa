//! Symbolic transition models
//!
//! Domain descriptions, expression trees and the runtime error codes shared
//! by every compiled expression.

pub mod domain;
pub mod error_codes;
pub mod expr;

pub use domain::{Domain, Fluent, FluentKind, ValueType, PRIME};
pub use error_codes::ErrorCodes;
pub use expr::{
    AggregationOp, ArithmeticOp, ControlOp, DistributionKind, Expr, FunctionOp, LogicalOp,
    NodeKind, RelationalOp,
};

pub mod prelude {
    pub use super::domain::{Domain, Fluent, FluentKind, ValueType};
    pub use super::error_codes::ErrorCodes;
    pub use super::expr::{
        AggregationOp, ArithmeticOp, DistributionKind, Expr, FunctionOp, LogicalOp, RelationalOp,
    };
}
