//! Gradient-based straight-line planner
//!
//! The plan holds one tensor of unconstrained parameters per action, shaped
//! `[horizon, *action shape]`. Each loss evaluation projects the plan into
//! the legal action domains, simulates a batch of relaxed trajectories and
//! negates the aggregated return. Gradients come from forward-mode duals
//! seeded with one partial per plan parameter.

use std::collections::BTreeMap;
use std::iter::FusedIterator;

use tracing::{debug, trace, warn};

use super::aggregation::ReturnAggregation;
use super::bounds::ActionBounds;
use super::config::PlannerConfig;
use super::initializer::Initializer;
use super::optimizer::{GradientRule, OptimizerState};
use super::projection::Projection;
use super::record::EpochRecord;
use super::Plan;
use crate::autodiff::{Array, Dual, Tensor};
use crate::compiler::{Bindings, Compiler, Diagnostic};
use crate::error::PlanResult;
use crate::logic::FuzzyLogic;
use crate::model::{Domain, ErrorCodes};
use crate::random::RngKey;
use crate::rollout::{time_slices, BatchedRollout, Simulator};

/// Result of one batched loss evaluation
#[derive(Clone, Debug)]
pub struct LossEvaluation {
    /// Negated aggregate return
    pub loss: f64,
    /// Key to use for the next evaluation
    pub key: RngKey,
    pub rollouts: BatchedRollout,
    /// OR of the errors of every trajectory in the batch
    pub errors: ErrorCodes,
}

/// Builder for [`BackpropPlanner`]
pub struct PlannerBuilder {
    domain: Domain,
    config: PlannerConfig,
}

impl PlannerBuilder {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            config: PlannerConfig::default(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the planning horizon
    pub fn horizon(mut self, horizon: usize) -> Self {
        self.config.horizon = horizon;
        self
    }

    /// Set the number of trajectories per loss evaluation
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Set the root randomness seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Replace all action bounds
    pub fn action_bounds(mut self, bounds: ActionBounds) -> Self {
        self.config.action_bounds = bounds;
        self
    }

    /// Bound a single action; non-finite or inverted intervals are dropped
    pub fn action_bound(mut self, action: impl Into<String>, min: f64, max: f64) -> Self {
        self.config.action_bounds.insert(action, min, max);
        self
    }

    pub fn initializer(mut self, initializer: Initializer) -> Self {
        self.config.initializer = initializer;
        self
    }

    pub fn optimizer(mut self, rule: GradientRule) -> Self {
        self.config.optimizer = rule;
        self
    }

    /// Set the step size of the current update rule
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.config.optimizer = self.config.optimizer.with_learning_rate(learning_rate);
        self
    }

    pub fn aggregation(mut self, aggregation: ReturnAggregation) -> Self {
        self.config.aggregation = aggregation;
        self
    }

    pub fn logic(mut self, logic: FuzzyLogic) -> Self {
        self.config.logic = logic;
        self
    }

    /// Enable or disable parallel batch simulation
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.config.parallel = enabled;
        self
    }

    /// Validate and compile; fails before any plan exists
    pub fn build(self) -> PlanResult<BackpropPlanner> {
        BackpropPlanner::new(&self.domain, self.config)
    }
}

/// Backpropagation planner over a relaxed domain
#[derive(Debug)]
pub struct BackpropPlanner {
    config: PlannerConfig,
    relaxed: Simulator,
    exact: Simulator,
    projection: Projection,
    /// Plan shape per action, `[horizon, *action shape]`
    shapes: BTreeMap<String, Vec<usize>>,
    init: Bindings,
}

impl BackpropPlanner {
    /// Create a builder for the planner
    pub fn builder(domain: Domain) -> PlannerBuilder {
        PlannerBuilder::new(domain)
    }

    pub fn new(domain: &Domain, mut config: PlannerConfig) -> PlanResult<Self> {
        config.validate()?;
        domain.validate()?;

        let relaxed = Compiler::relaxed(config.logic).compile(domain)?;
        let exact = Compiler::exact().compile(domain)?;

        for (action, _) in config.action_bounds.iter() {
            if !domain.action_fluents().any(|f| f.name == action) {
                warn!(action, "bounds given for an unknown action are ignored");
            }
        }

        let shapes = domain
            .action_fluents()
            .map(|fluent| {
                let mut shape = Vec::with_capacity(fluent.shape.len() + 1);
                shape.push(config.horizon);
                shape.extend_from_slice(&fluent.shape);
                (fluent.name.clone(), shape)
            })
            .collect();

        let projection = Projection::new(domain, &config.action_bounds);
        let relaxed = Simulator::new(relaxed).with_parallel(config.parallel);
        let exact = Simulator::new(exact).with_parallel(config.parallel);
        let init = relaxed.initial_bindings();

        debug!(
            domain = %domain.name,
            horizon = config.horizon,
            batch = config.batch_size,
            logic = config.logic.name(),
            diagnostics = relaxed.model().diagnostics.len(),
            "planner ready"
        );

        Ok(Self {
            config,
            relaxed,
            exact,
            projection,
            shapes,
            init,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Approximation notes raised while compiling the relaxed model
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.relaxed.model().diagnostics
    }

    /// Draw a fresh plan and optimizer state; returns the advanced key
    pub fn initialize(&self, key: RngKey) -> (Plan, OptimizerState, RngKey) {
        let mut key = key;
        let mut plan = Plan::new();
        for (action, shape) in &self.shapes {
            let (next, subkey) = key.split();
            key = next;
            plan.insert(action.clone(), self.config.initializer.sample(shape, subkey));
        }
        let state = self.config.optimizer.init(&plan);
        trace!(actions = plan.len(), "initialized plan");
        (plan, state, key)
    }

    /// Projected plan, as an environment would receive it
    pub fn project(&self, plan: &Plan) -> Plan {
        self.projection
            .project(&seed(plan, false))
            .into_iter()
            .map(|(name, t)| (name, t.to_array()))
            .collect()
    }

    /// Loss of `plan` under the relaxed model
    pub fn loss(&self, plan: &Plan, key: RngKey) -> LossEvaluation {
        self.evaluate(plan, key, false).1
    }

    /// Gradient of the loss with respect to every plan parameter
    pub fn gradient(&self, plan: &Plan, key: RngKey) -> (Plan, LossEvaluation) {
        self.evaluate(plan, key, true)
    }

    /// One gradient step on `plan`; the evaluation is that of the pre-update plan
    pub fn update(
        &self,
        plan: &mut Plan,
        state: &mut OptimizerState,
        key: RngKey,
    ) -> LossEvaluation {
        let (grads, evaluation) = self.gradient(plan, key);
        self.config.optimizer.apply(plan, &grads, state);
        evaluation
    }

    /// Simulate the discretized projection of `plan` under exact semantics
    pub fn evaluate_exact(&self, plan: &Plan, key: RngKey) -> LossEvaluation {
        let actions = self.projection.project_discrete(&seed(plan, false));
        let slices = time_slices(&actions, self.config.horizon);
        let init = self.exact.initial_bindings();
        let rollouts = self
            .exact
            .batched_rollout(&init, &slices, key, self.config.batch_size);
        let loss = -self.config.aggregation.apply(&rollouts.returns).value();
        LossEvaluation {
            loss,
            key: rollouts.key,
            errors: rollouts.error_union(),
            rollouts,
        }
    }

    /// Lazily run `epochs` gradient steps from the configured seed
    pub fn optimize(&self, epochs: usize) -> Optimize<'_> {
        self.optimize_from(RngKey::new(self.config.seed), epochs)
    }

    /// Lazily run `epochs` gradient steps starting from `key`
    pub fn optimize_from(&self, key: RngKey, epochs: usize) -> Optimize<'_> {
        let (plan, state, key) = self.initialize(key);
        let best_plan = self.project(&plan);
        Optimize {
            planner: self,
            plan,
            state,
            key,
            best_plan,
            best_loss: f64::INFINITY,
            epoch: 0,
            epochs,
            current: None,
        }
    }

    fn evaluate(&self, plan: &Plan, key: RngKey, track: bool) -> (Plan, LossEvaluation) {
        let projected = self.projection.project(&seed(plan, track));
        let slices = time_slices(&projected, self.config.horizon);
        let rollouts = self
            .relaxed
            .batched_rollout(&self.init, &slices, key, self.config.batch_size);
        let loss = -&self.config.aggregation.apply(&rollouts.returns);
        let grads = unseed(plan, loss.grad());
        let evaluation = LossEvaluation {
            loss: loss.value(),
            key: rollouts.key,
            errors: rollouts.error_union(),
            rollouts,
        };
        (grads, evaluation)
    }
}

/// Plan parameters as tensors; with `track`, one partial per parameter
fn seed(plan: &Plan, track: bool) -> BTreeMap<String, Tensor> {
    let n = if track {
        plan.values().map(Array::len).sum()
    } else {
        0
    };
    let mut offset = 0;
    plan.iter()
        .map(|(name, params)| {
            let data = params
                .values()
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    if track {
                        Dual::variable(*v, offset + i, n)
                    } else {
                        Dual::constant(*v)
                    }
                })
                .collect();
            offset += params.len();
            let tensor = Tensor::from_duals(params.shape().to_vec(), data)
                .unwrap_or_else(|| Tensor::from_array(params));
            (name.clone(), tensor)
        })
        .collect()
}

/// Scatter a flat gradient back into the layout of `plan`
fn unseed(plan: &Plan, grad: &[f64]) -> Plan {
    let mut offset = 0;
    plan.iter()
        .map(|(name, params)| {
            let values = (0..params.len())
                .map(|i| grad.get(offset + i).copied().unwrap_or(0.0))
                .collect();
            offset += params.len();
            let grads = Array::from_parts(params.shape().to_vec(), values)
                .unwrap_or_else(|| Array::zeros(params.shape()));
            (name.clone(), grads)
        })
        .collect()
}

/// Pull-driven optimization run.
///
/// Each call to [`next`](Iterator::next) performs one gradient step and one
/// fresh loss evaluation of the updated plan, then yields an
/// [`EpochRecord`]. Stopping iteration cancels the run.
pub struct Optimize<'a> {
    planner: &'a BackpropPlanner,
    plan: Plan,
    state: OptimizerState,
    key: RngKey,
    best_plan: Plan,
    best_loss: f64,
    epoch: usize,
    epochs: usize,
    current: Option<EpochRecord>,
}

impl<'a> Optimize<'a> {
    pub fn has_more(&self) -> bool {
        self.epoch < self.epochs
    }

    pub fn epochs_remaining(&self) -> usize {
        self.epochs.saturating_sub(self.epoch)
    }

    /// Most recently yielded record
    pub fn current(&self) -> Option<&EpochRecord> {
        self.current.as_ref()
    }

    /// Unprojected plan parameters
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn best_plan(&self) -> &Plan {
        &self.best_plan
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    fn advance(&mut self) -> EpochRecord {
        let update = self
            .planner
            .update(&mut self.plan, &mut self.state, self.key);
        self.key = update.key;

        let evaluation = self.planner.loss(&self.plan, self.key);
        self.key = evaluation.key;

        let projected = self.planner.project(&self.plan);
        if evaluation.loss < self.best_loss {
            self.best_loss = evaluation.loss;
            self.best_plan = projected.clone();
        }

        debug!(
            epoch = self.epoch,
            loss = evaluation.loss,
            best_loss = self.best_loss,
            errors = ?evaluation.errors,
            "epoch complete"
        );

        let record = EpochRecord {
            epoch: self.epoch,
            plan: projected,
            best_plan: self.best_plan.clone(),
            loss: evaluation.loss,
            best_loss: self.best_loss,
            rollouts: evaluation.rollouts.stacked_bindings(),
            error_codes: evaluation.errors,
            errors: evaluation.errors.decode(),
        };
        self.epoch += 1;
        self.current = Some(record.clone());
        record
    }
}

impl<'a> Iterator for Optimize<'a> {
    type Item = EpochRecord;

    fn next(&mut self) -> Option<EpochRecord> {
        self.has_more().then(|| self.advance())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.epochs_remaining();
        (n, Some(n))
    }
}

impl<'a> ExactSizeIterator for Optimize<'a> {}

impl<'a> FusedIterator for Optimize<'a> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompileError, PlannerError};
    use crate::model::{DistributionKind, Expr, Fluent, FunctionOp, ValueType};

    fn toggle() -> Domain {
        Domain::new("toggle", Expr::var("s"))
            .with_fluent(Fluent::state("s", ValueType::Real, 2.0))
            .with_fluent(Fluent::action("a", ValueType::Bool))
            .with_cpf("s'", Expr::add(Expr::var("s"), Expr::var("a")))
    }

    fn planner() -> BackpropPlanner {
        BackpropPlanner::builder(toggle())
            .horizon(3)
            .batch_size(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_initialize_shapes_and_zeros() {
        let planner = planner();
        let (plan, state, key) = planner.initialize(RngKey::new(0));
        assert_eq!(plan["a"].shape(), &[3]);
        assert!(plan["a"].values().iter().all(|v| *v == 0.0));
        assert_eq!(state.first.len(), 3);
        assert_ne!(key, RngKey::new(0));
    }

    #[test]
    fn test_initial_loss_matches_hand_computation() {
        let planner = planner();
        let (plan, _, key) = planner.initialize(RngKey::new(0));
        let evaluation = planner.loss(&plan, key);
        let expected = -(2.0 + (2.0 + 0.5) + (2.0 + 1.0));
        assert!((evaluation.loss - expected).abs() < 1e-12);
        assert!(evaluation.errors.is_normal());
    }

    #[test]
    fn test_gradient_of_boolean_action() {
        let planner = planner();
        let (plan, _, key) = planner.initialize(RngKey::new(0));
        let (grads, _) = planner.gradient(&plan, key);
        // a_0 feeds rewards at steps 1 and 2, a_1 at step 2, a_2 at none
        let g = grads["a"].values();
        assert!((g[0] + 0.5).abs() < 1e-12);
        assert!((g[1] + 0.25).abs() < 1e-12);
        assert_eq!(g[2], 0.0);
    }

    #[test]
    fn test_singular_derivative_does_not_poison_gradient() {
        // s stays at 0, so sqrt(s) has an infinite local derivative
        let domain = Domain::new(
            "pinned",
            Expr::add(
                Expr::function(FunctionOp::Sqrt, vec![Expr::var("s")]),
                Expr::var("b"),
            ),
        )
        .with_fluent(Fluent::state("s", ValueType::Real, 0.0))
        .with_fluent(Fluent::action("a", ValueType::Real))
        .with_fluent(Fluent::action("b", ValueType::Real))
        .with_cpf("s'", Expr::mul(Expr::var("s"), Expr::var("a")));
        let planner = BackpropPlanner::builder(domain)
            .horizon(3)
            .batch_size(1)
            .build()
            .unwrap();

        let (mut plan, mut state, key) = planner.initialize(RngKey::new(0));
        let (grads, _) = planner.gradient(&plan, key);
        assert_eq!(grads["b"].values(), &[-1.0, -1.0, -1.0]);
        assert_eq!(grads["a"].values(), &[0.0, 0.0, 0.0]);

        planner.update(&mut plan, &mut state, key);
        assert!(plan.values().all(|p| p.values().iter().all(|v| v.is_finite())));
        assert!(planner.loss(&plan, key).loss.is_finite());
    }

    #[test]
    fn test_update_lowers_loss() {
        let planner = planner();
        let (mut plan, mut state, key) = planner.initialize(RngKey::new(0));
        let before = planner.loss(&plan, key).loss;
        planner.update(&mut plan, &mut state, key);
        let after = planner.loss(&plan, key).loss;
        assert!(after < before);
    }

    #[test]
    fn test_optimize_tracks_best() {
        let planner = planner();
        let records: Vec<EpochRecord> = planner.optimize(5).collect();
        assert_eq!(records.len(), 5);
        let mut running = f64::INFINITY;
        for (i, r) in records.iter().enumerate() {
            running = running.min(r.loss);
            assert_eq!(r.epoch, i);
            assert_eq!(r.best_loss, running);
            assert_eq!(r.rollouts["s"].shape(), &[1]);
        }
    }

    #[test]
    fn test_optimize_iterator_state() {
        let planner = planner();
        let mut run = planner.optimize(2);
        assert!(run.has_more());
        assert!(run.current().is_none());
        assert_eq!(run.len(), 2);
        run.next();
        assert_eq!(run.epochs_remaining(), 1);
        assert_eq!(run.current().map(|r| r.epoch), Some(0));
        run.next();
        assert!(!run.has_more());
        assert!(run.next().is_none());
    }

    #[test]
    fn test_gamma_fails_before_planning() {
        let domain = Domain::new("g", Expr::var("s"))
            .with_fluent(Fluent::state("s", ValueType::Real, 0.0))
            .with_cpf(
                "s'",
                Expr::distribution(
                    DistributionKind::Gamma,
                    vec![Expr::constant(1.0), Expr::constant(1.0)],
                ),
            );
        let err = BackpropPlanner::builder(domain).build().unwrap_err();
        assert!(matches!(
            err,
            PlannerError::Compile(CompileError::NotImplemented { .. })
        ));
    }

    #[test]
    fn test_bounded_action_and_learning_rate() {
        let domain = Domain::new("flow", Expr::var("s"))
            .with_fluent(Fluent::state("s", ValueType::Real, 0.0))
            .with_fluent(Fluent::action("f", ValueType::Real))
            .with_cpf("s'", Expr::add(Expr::var("s"), Expr::var("f")));
        let planner = BackpropPlanner::builder(domain)
            .horizon(2)
            .batch_size(1)
            .action_bound("f", -1.0, 3.0)
            .learning_rate(0.5)
            .build()
            .unwrap();
        assert_eq!(planner.config().optimizer.learning_rate(), 0.5);
        let (plan, _, _) = planner.initialize(RngKey::new(0));
        assert_eq!(planner.project(&plan)["f"].values(), &[1.0, 1.0]);
    }

    #[test]
    fn test_evaluate_exact_discretizes_booleans() {
        let planner = planner();
        let mut plan = Plan::new();
        plan.insert(
            "a".to_string(),
            Array::from_parts(vec![3], vec![4.0, -4.0, 4.0]).unwrap(),
        );
        let evaluation = planner.evaluate_exact(&plan, RngKey::new(0));
        assert_eq!(evaluation.loss, -(2.0 + 3.0 + 3.0));
    }
}
