//! Property-based tests for relaxplan
//!
//! Uses proptest to verify invariants of the fuzzy logic, projection, error
//! accumulation and planner bookkeeping.

use proptest::prelude::*;
use relaxplan::planner::{ActionBounds, ActionDomain, Bounds};
use relaxplan::prelude::*;

const LOGICS: [FuzzyLogic; 2] = [FuzzyLogic::Product, FuzzyLogic::Minimum];

fn c(v: f64) -> Dual {
    Dual::constant(v)
}

fn noisy_domain() -> Domain {
    Domain::new("noisy", Expr::var("s"))
        .with_fluent(Fluent::state("s", ValueType::Real, 0.0))
        .with_fluent(Fluent::action("a", ValueType::Real))
        .with_cpf(
            "s'",
            Expr::add(
                Expr::var("s"),
                Expr::normal(
                    Expr::function(FunctionOp::Sin, vec![Expr::var("a")]),
                    Expr::constant(0.5),
                ),
            ),
        )
}

proptest! {
    // ==================== Fuzzy Logic Properties ====================

    #[test]
    fn double_negation_is_identity(x in 0.0..=1.0f64) {
        for logic in LOGICS {
            let back = logic.not(&logic.not(&c(x))).value();
            prop_assert!((back - x).abs() < 1e-12);
        }
    }

    #[test]
    fn or_is_de_morgan_dual_of_and(a in 0.0..=1.0f64, b in 0.0..=1.0f64) {
        for logic in LOGICS {
            let or = logic.or(&c(a), &c(b)).value();
            let dual = logic.not(&logic.and(&logic.not(&c(a)), &logic.not(&c(b)))).value();
            prop_assert!((or - dual).abs() < 1e-12);
        }
    }

    #[test]
    fn implies_is_not_a_or_b(a in 0.0..=1.0f64, b in 0.0..=1.0f64) {
        for logic in LOGICS {
            let implies = logic.implies(&c(a), &c(b)).value();
            let expected = logic.or(&logic.not(&c(a)), &c(b)).value();
            prop_assert!((implies - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn product_and_below_min(a in 0.0..=1.0f64, b in 0.0..=1.0f64) {
        let and = FuzzyLogic::Product.and(&c(a), &c(b)).value();
        prop_assert!(and <= a.min(b) + 1e-15);
    }

    #[test]
    fn minimum_and_is_exact_min(a in 0.0..=1.0f64, b in 0.0..=1.0f64) {
        prop_assert_eq!(FuzzyLogic::Minimum.and(&c(a), &c(b)).value(), a.min(b));
    }

    #[test]
    fn forall_with_a_zero_is_zero(
        values in prop::collection::vec(0.0..=1.0f64, 0..10),
        position in 0usize..10
    ) {
        let mut values = values;
        let position = position.min(values.len());
        values.insert(position, 0.0);
        let duals: Vec<Dual> = values.iter().map(|v| c(*v)).collect();
        for logic in LOGICS {
            prop_assert_eq!(logic.forall(&duals).value(), 0.0);
        }
    }

    #[test]
    fn forall_of_ones_is_one(n in 0usize..20) {
        let ones = vec![c(1.0); n];
        for logic in LOGICS {
            prop_assert_eq!(logic.forall(&ones).value(), 1.0);
        }
    }

    // ==================== Projection Properties ====================

    #[test]
    fn boolean_projection_strictly_inside_unit(x in -30.0..30.0f64) {
        let action = ActionDomain { range: ValueType::Bool, bounds: None };
        let v = action.project(&c(x)).value();
        prop_assert!(v > 0.0 && v < 1.0);
    }

    #[test]
    fn bounded_projection_within_bounds(
        x in -1e6..1e6f64,
        lb in -100.0..100.0f64,
        width in 0.0..100.0f64
    ) {
        let bounds = Bounds::new(lb, lb + width);
        prop_assert!(bounds.is_some());
        let action = ActionDomain { range: ValueType::Real, bounds };
        let v = action.project(&c(x)).value();
        prop_assert!(v >= lb && v <= lb + width);
    }

    #[test]
    fn inverted_bounds_are_dropped(lb in -100.0..100.0f64, gap in 1e-6..100.0f64) {
        let bounds = ActionBounds::new().with("a", lb, lb - gap);
        prop_assert!(bounds.is_empty());
    }

    // ==================== Error Code Properties ====================

    #[test]
    fn error_accumulation_is_order_independent(
        bits in prop::collection::vec(0u32..(1 << 11), 0..20)
    ) {
        let codes: Vec<ErrorCodes> = bits.iter().map(|b| ErrorCodes::from_bits_truncate(*b)).collect();
        let forward = ErrorCodes::accumulate(codes.iter().copied());
        let backward = ErrorCodes::accumulate(codes.iter().rev().copied());
        let (evens, odds): (Vec<_>, Vec<_>) = codes.iter().enumerate().partition(|(i, _)| i % 2 == 0);
        let grouped = ErrorCodes::accumulate(evens.into_iter().map(|(_, c)| *c))
            | ErrorCodes::accumulate(odds.into_iter().map(|(_, c)| *c));
        prop_assert_eq!(forward, backward);
        prop_assert_eq!(forward, grouped);
    }

    // ==================== Randomness Properties ====================

    #[test]
    fn split_is_deterministic(seed in any::<u64>()) {
        let key = RngKey::new(seed);
        prop_assert_eq!(key.split(), key.split());
        let (a, b) = key.split();
        prop_assert_ne!(a, b);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn batched_rollout_is_reproducible(seed in any::<u64>(), action in -2.0..2.0f64) {
        let model = Compiler::relaxed(FuzzyLogic::Product).compile(&noisy_domain()).unwrap();
        let sim = Simulator::new(model);
        let init = sim.initial_bindings();
        let actions: Vec<Bindings> = (0..4)
            .map(|_| Bindings::from([("a".to_string(), Tensor::constant(action))]))
            .collect();
        let a = sim.batched_rollout(&init, &actions, RngKey::new(seed), 3);
        let b = sim.batched_rollout(&init, &actions, RngKey::new(seed), 3);
        prop_assert_eq!(&a.returns, &b.returns);
        prop_assert_eq!(a.key, b.key);
        prop_assert_eq!(&a.errors, &b.errors);
        prop_assert_eq!(a.stacked_bindings(), b.stacked_bindings());
    }

    #[test]
    fn best_loss_is_running_minimum(seed in any::<u64>()) {
        let planner = BackpropPlanner::builder(noisy_domain())
            .horizon(3)
            .batch_size(2)
            .seed(seed)
            .initializer(Initializer::Normal { stddev: 1.0 })
            .optimizer(GradientRule::sgd(2.0))
            .build()
            .unwrap();
        let mut running = f64::INFINITY;
        for record in planner.optimize(6) {
            if record.loss < running {
                running = record.loss;
            }
            prop_assert_eq!(record.best_loss, running);
        }
    }
}
