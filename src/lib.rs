//! # relaxplan
//!
//! Gradient-based planning over symbolic sequential decision models.
//!
//! Transition and reward functions are given as expression trees. Logical
//! operators, branching and discrete sampling are not differentiable, so the
//! compiler relaxes them with fuzzy logic; the rollout engine then composes
//! the compiled step functions over a horizon, and the planner descends the
//! gradient of the negated batched return with respect to a straight-line
//! action plan.
//!
//! ## Core Concepts
//!
//! - **Fuzzy logic**: product or minimum t-norm relaxations of Boolean logic
//! - **Dispatch-table compiler**: exact base semantics with relaxed overrides
//! - **Explicit randomness**: a splittable key threaded through every sample
//! - **Error bitmasks**: runtime anomalies are OR-ed, never thrown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relaxplan::prelude::*;
//!
//! let domain = Domain::new("counter", Expr::var("s"))
//!     .with_fluent(Fluent::state("s", ValueType::Real, 0.0))
//!     .with_fluent(Fluent::action("go", ValueType::Bool))
//!     .with_cpf("s'", Expr::add(Expr::var("s"), Expr::var("go")));
//!
//! let planner = BackpropPlanner::builder(domain)
//!     .horizon(5)
//!     .batch_size(8)
//!     .build()?;
//!
//! for record in planner.optimize(100) {
//!     println!("{} {}", record.epoch, record.best_loss);
//! }
//! ```

pub mod autodiff;
pub mod compiler;
pub mod error;
pub mod logic;
pub mod model;
pub mod planner;
pub mod random;
pub mod rollout;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::autodiff::prelude::*;
    pub use crate::compiler::prelude::*;
    pub use crate::error::*;
    pub use crate::logic::prelude::*;
    pub use crate::model::prelude::*;
    pub use crate::planner::prelude::*;
    pub use crate::random::prelude::*;
    pub use crate::rollout::prelude::*;
}
