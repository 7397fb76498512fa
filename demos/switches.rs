//! Light Switches
//!
//! Four switches start off. Each step the agent may toggle any subset of
//! them at a small cost, and earns a bonus on every step where all of them
//! are on. Toggling is an exclusive-or and the bonus is a universal
//! quantifier, so the same domain is planned under both fuzzy logics and
//! the resulting plans are checked under exact semantics.

use relaxplan::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const SWITCHES: usize = 4;

fn switches() -> Domain {
    let all_on = Expr::aggregation(AggregationOp::Forall, vec![0], Expr::var("on"));
    let cost = Expr::mul(
        Expr::constant(0.5),
        Expr::aggregation(AggregationOp::Sum, vec![0], Expr::var("flip")),
    );
    let reward = Expr::sub(
        Expr::if_then_else(all_on, Expr::constant(10.0), Expr::constant(0.0)),
        cost,
    );

    Domain::new("switches", reward)
        .with_fluent(Fluent::state("on", ValueType::Bool, 0.0).with_shape(vec![SWITCHES]))
        .with_fluent(Fluent::action("flip", ValueType::Bool).with_shape(vec![SWITCHES]))
        .with_cpf(
            "on'",
            Expr::logical(LogicalOp::Xor, vec![Expr::var("on"), Expr::var("flip")]),
        )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();

    println!("=== Light Switches ===\n");

    let domain = switches();
    for logic in [FuzzyLogic::Product, FuzzyLogic::Minimum] {
        let planner = BackpropPlanner::builder(domain.clone())
            .horizon(5)
            .batch_size(1)
            .logic(logic)
            .initializer(Initializer::Normal { stddev: 0.1 })
            .build()?;

        let mut run = planner.optimize(150);
        let last = run.by_ref().last();
        let exact = planner.evaluate_exact(run.plan(), RngKey::new(0));

        println!("{} logic", logic.name());
        if let Some(record) = last {
            println!("  relaxed best loss: {:.4}", record.best_loss);
        }
        println!("  exact loss:        {:.4}", exact.loss);
        println!("  flips per step:");
        for (t, row) in run.best_plan()["flip"].values().chunks(SWITCHES).enumerate() {
            let row: Vec<String> = row.iter().map(|p| format!("{:.2}", p)).collect();
            println!("    t = {}: [{}]", t, row.join(", "));
        }
        println!();
    }

    Ok(())
}
