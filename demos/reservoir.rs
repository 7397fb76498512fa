//! Reservoir Control
//!
//! This demo plans water releases for a reservoir with stochastic rainfall.
//! Releasing water earns reward, letting the level rise above capacity is
//! penalized. The release action is bounded, so the planner optimizes it
//! through a sigmoid projection onto `[0, 15]`.
//!
//! Set `RUST_LOG=relaxplan=debug` to follow each epoch.

use relaxplan::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn reservoir() -> Domain {
    let level = || Expr::var("level");
    let overflow = Expr::relational(RelationalOp::Greater, level(), Expr::var("capacity"));
    let penalty = Expr::mul(
        Expr::if_then_else(overflow, Expr::constant(1.0), Expr::constant(0.0)),
        Expr::var("overflow_cost"),
    );
    let inflow = Expr::distribution(
        DistributionKind::Weibull,
        vec![Expr::constant(2.0), Expr::var("rain_scale")],
    );

    Domain::new("reservoir", Expr::sub(Expr::var("release"), penalty))
        .with_fluent(Fluent::state("level", ValueType::Real, 60.0))
        .with_fluent(Fluent::non_fluent("capacity", ValueType::Real, 100.0))
        .with_fluent(Fluent::non_fluent("overflow_cost", ValueType::Real, 50.0))
        .with_fluent(Fluent::non_fluent("rain_scale", ValueType::Real, 8.0))
        .with_fluent(Fluent::action("release", ValueType::Real))
        .with_cpf(
            "level'",
            Expr::function(
                FunctionOp::Max,
                vec![
                    Expr::sub(Expr::add(level(), inflow), Expr::var("release")),
                    Expr::constant(0.0),
                ],
            ),
        )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    println!("=== Reservoir Control ===\n");

    let planner = BackpropPlanner::builder(reservoir())
        .horizon(12)
        .batch_size(64)
        .seed(7)
        .action_bound("release", 0.0, 15.0)
        .optimizer(GradientRule::adam(0.2))
        .build()?;

    for diagnostic in planner.diagnostics() {
        println!("note [{}]: {}", diagnostic.location, diagnostic.message);
    }
    println!();

    let mut run = planner.optimize(200);
    for record in run.by_ref() {
        if record.epoch % 20 == 0 {
            println!(
                "Epoch {:4}: loss = {:10.4}, best = {:10.4}",
                record.epoch, record.loss, record.best_loss
            );
        }
        if !record.errors.is_empty() {
            println!("  errors: {:?}", record.errors);
        }
    }

    println!("\nBest loss: {:.4}", run.best_loss());
    println!("Releases:");
    for (t, release) in run.best_plan()["release"].values().iter().enumerate() {
        println!("  t = {:2}: {:6.2}", t, release);
    }

    let exact = planner.evaluate_exact(run.plan(), RngKey::new(1234));
    println!("\nExact evaluation loss: {:.4}", exact.loss);
    if !exact.errors.is_normal() {
        println!("Exact evaluation errors: {:?}", exact.errors.decode());
    }

    Ok(())
}
