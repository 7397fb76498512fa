//! End-to-end planner scenarios

use relaxplan::prelude::*;

/// One boolean action pushing a real state up by its truth value
fn toggle(initial: f64) -> Domain {
    Domain::new("toggle", Expr::var("state"))
        .with_fluent(Fluent::state("state", ValueType::Real, initial))
        .with_fluent(Fluent::action("action", ValueType::Bool))
        .with_cpf(
            "state'",
            Expr::add(Expr::var("state"), Expr::var("action")),
        )
}

/// Reservoir with stochastic rain, a bounded release and an overflow penalty
fn reservoir() -> Domain {
    let level = || Expr::var("level");
    let overflow = Expr::relational(RelationalOp::Greater, level(), Expr::var("capacity"));
    Domain::new(
        "reservoir",
        Expr::sub(
            Expr::var("release"),
            Expr::mul(
                Expr::if_then_else(overflow, Expr::constant(1.0), Expr::constant(0.0)),
                Expr::constant(20.0),
            ),
        ),
    )
    .with_fluent(Fluent::state("level", ValueType::Real, 50.0))
    .with_fluent(Fluent::non_fluent("capacity", ValueType::Real, 100.0))
    .with_fluent(Fluent::action("release", ValueType::Real))
    .with_cpf(
        "level'",
        Expr::function(
            FunctionOp::Max,
            vec![
                Expr::sub(
                    Expr::add(level(), Expr::normal(Expr::constant(5.0), Expr::constant(4.0))),
                    Expr::var("release"),
                ),
                Expr::constant(0.0),
            ],
        ),
    )
}

#[test]
fn test_initial_loss_matches_reference() {
    for state0 in [0.0, 1.5, -3.0] {
        let planner = BackpropPlanner::builder(toggle(state0))
            .horizon(3)
            .batch_size(1)
            .logic(FuzzyLogic::Product)
            .build()
            .unwrap();
        let (plan, _, key) = planner.initialize(RngKey::new(0));
        let evaluation = planner.loss(&plan, key);
        let expected = -(state0 + (state0 + 0.5) + (state0 + 1.0));
        assert!(
            (evaluation.loss - expected).abs() < 1e-9,
            "state0 = {}: {} vs {}",
            state0,
            evaluation.loss,
            expected
        );
    }
}

#[test]
fn test_planner_learns_to_press() {
    let planner = BackpropPlanner::builder(toggle(0.0))
        .horizon(4)
        .batch_size(1)
        .build()
        .unwrap();
    let last = planner.optimize(60).last().unwrap();
    let plan = last.best_plan["action"].values();
    assert!(plan[..3].iter().all(|p| *p > 0.9), "{:?}", plan);
    assert!(last.best_loss < -5.5);
}

#[test]
fn test_unsupported_distribution_fails_compilation() {
    let domain = Domain::new("queue", Expr::var("waiting"))
        .with_fluent(Fluent::state("waiting", ValueType::Real, 0.0))
        .with_cpf(
            "waiting'",
            Expr::distribution(
                DistributionKind::Gamma,
                vec![Expr::constant(2.0), Expr::constant(1.0)],
            ),
        );
    match BackpropPlanner::builder(domain).build() {
        Err(PlannerError::Compile(CompileError::NotImplemented { construct, location })) => {
            assert!(construct.contains("Gamma"));
            assert_eq!(location, "cpf waiting' > Gamma");
        }
        other => panic!("expected a compile failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_invalid_domain_rejected() {
    let domain = Domain::new("broken", Expr::constant(0.0))
        .with_fluent(Fluent::state("s", ValueType::Real, 0.0));
    assert!(matches!(
        BackpropPlanner::builder(domain).build(),
        Err(PlannerError::Domain(DomainError::MissingCpf(_)))
    ));
}

#[test]
fn test_optimization_is_reproducible() {
    let run = || {
        BackpropPlanner::builder(reservoir())
            .horizon(5)
            .batch_size(4)
            .seed(11)
            .action_bound("release", 0.0, 10.0)
            .parallel(true)
            .build()
            .unwrap()
            .optimize(3)
            .map(|r| (r.loss, r.plan))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_reservoir_records() {
    let planner = BackpropPlanner::builder(reservoir())
        .horizon(5)
        .batch_size(4)
        .action_bound("release", 0.0, 10.0)
        .build()
        .unwrap();
    assert!(!planner.diagnostics().is_empty());

    let records: Vec<EpochRecord> = planner.optimize(10).collect();
    for record in &records {
        assert_eq!(record.rollouts["level"].shape(), &[4]);
        assert!(record.plan["release"]
            .values()
            .iter()
            .all(|r| (0.0..=10.0).contains(r)));
        assert!(record.errors.is_empty());
        assert!(record.to_json().is_ok());
    }
    assert!(records.last().unwrap().best_loss <= records[0].loss);
}

#[test]
fn test_exact_evaluation_of_best_plan() {
    let planner = BackpropPlanner::builder(toggle(0.0))
        .horizon(3)
        .batch_size(2)
        .build()
        .unwrap();
    let mut run = planner.optimize(30);
    run.by_ref().for_each(drop);
    let evaluation = planner.evaluate_exact(run.plan(), RngKey::new(5));
    assert_eq!(evaluation.rollouts.returns.len(), 2);
    assert_eq!(evaluation.loss, -3.0);
    assert!(evaluation.errors.is_normal());
}

#[test]
fn test_minimum_logic_quantifier() {
    let domain = Domain::new("all_on", Expr::var("score"))
        .with_fluent(Fluent::state("score", ValueType::Real, 0.0))
        .with_fluent(Fluent::action("lights", ValueType::Bool).with_shape(vec![3]))
        .with_cpf(
            "score'",
            Expr::aggregation(AggregationOp::Forall, vec![0], Expr::var("lights")),
        );
    let planner = BackpropPlanner::builder(domain)
        .horizon(2)
        .batch_size(1)
        .logic(FuzzyLogic::Minimum)
        .build()
        .unwrap();
    let (plan, _, key) = planner.initialize(RngKey::new(0));
    assert_eq!(plan["lights"].shape(), &[2, 3]);
    // score_1 = min(0.5, 0.5, 0.5)
    assert!((planner.loss(&plan, key).loss + 0.5).abs() < 1e-12);
    assert_eq!(planner.diagnostics().len(), 1);
}

#[test]
fn test_domain_from_json_plans() {
    let json = toggle(1.0).to_json().unwrap();
    let domain = Domain::from_json(&json).unwrap();
    assert_eq!(domain, toggle(1.0));

    let config: PlannerConfig =
        serde_json::from_str(r#"{"horizon": 3, "batch_size": 1, "seed": 3}"#).unwrap();
    let planner = BackpropPlanner::new(&domain, config).unwrap();
    let first = planner.optimize(1).next().unwrap();
    assert_eq!(first.epoch, 0);
    assert!(first.loss < -(1.0 + 1.5 + 2.0));
}

/// Counter whose CPF carries an invalid Normal in one `if` branch
fn latent_error(cpf: Expr) -> BackpropPlanner {
    let domain = Domain::new("latent", Expr::var("s"))
        .with_fluent(Fluent::state("s", ValueType::Real, 0.0))
        .with_fluent(Fluent::action("a", ValueType::Bool))
        .with_cpf("s'", cpf);
    BackpropPlanner::builder(domain)
        .horizon(3)
        .batch_size(3)
        .build()
        .unwrap()
}

fn invalid_normal() -> Expr {
    Expr::normal(Expr::constant(0.0), Expr::constant(-1.0))
}

#[test]
fn test_else_branch_error_reaches_records() {
    let planner = latent_error(Expr::if_then_else(
        Expr::var("a"),
        Expr::constant(0.0),
        invalid_normal(),
    ));
    for record in planner.optimize(3) {
        assert_eq!(record.errors, vec!["INVALID_PARAM_NORMAL"]);
        assert_eq!(record.error_codes, ErrorCodes::INVALID_PARAM_NORMAL);
        assert!(record.loss.is_finite());
    }
}

#[test]
fn test_then_branch_error_reported_when_predicate_false() {
    let planner = latent_error(Expr::if_then_else(
        Expr::constant(0.0),
        invalid_normal(),
        Expr::add(Expr::var("s"), Expr::var("a")),
    ));
    let record = planner.optimize(1).next().unwrap();
    assert_eq!(record.errors, vec!["INVALID_PARAM_NORMAL"]);
    // the else branch is the one simulated
    assert!((record.loss + (0.5 + 1.0)).abs() < 0.2);

    let (plan, _, key) = planner.initialize(RngKey::new(0));
    let exact = planner.evaluate_exact(&plan, key);
    assert_eq!(exact.errors.decode(), vec!["INVALID_PARAM_NORMAL"]);
}
