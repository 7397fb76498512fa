//! Relaxed overrides of the base dispatch table
//!
//! Logic, quantifiers and `if` are rewritten with the compiler's fuzzy
//! logic, Kronecker deltas collapse to their argument, and distributions
//! without a reparameterization are rejected outright. Everything else is
//! inherited from [`base`](super::base).

use super::base::{self, Truth};
use super::{Builder, CompileContext, CompiledNode, Compiler};
use crate::error::{CompileError, CompileResult};
use crate::model::{AggregationOp, DistributionKind, Expr, NodeKind};

/// Entries overlaid on the base table by [`Compiler::relaxed`]
pub fn overrides() -> Vec<(NodeKind, Builder)> {
    vec![
        entry(NodeKind::Logical, logical),
        entry(NodeKind::Aggregation, aggregation),
        entry(NodeKind::Control, control),
        entry(NodeKind::Distribution(DistributionKind::KronDelta), kron_delta),
        entry(NodeKind::Distribution(DistributionKind::Poisson), unsupported),
        entry(NodeKind::Distribution(DistributionKind::Gamma), unsupported),
    ]
}

fn entry(kind: NodeKind, builder: Builder) -> (NodeKind, Builder) {
    (kind, builder)
}

fn fuzzy(compiler: &Compiler) -> Truth {
    Truth::Fuzzy(compiler.logic())
}

fn logical(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    ctx.warn(format!(
        "logical operator `{}` replaced by {} logic",
        expr.label(),
        compiler.logic().name()
    ));
    base::logical(compiler, expr, ctx, fuzzy(compiler))
}

fn aggregation(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    if let Expr::Aggregation {
        op: op @ (AggregationOp::Forall | AggregationOp::Exists),
        ..
    } = expr
    {
        ctx.warn(format!(
            "quantifier `{}` replaced by {} logic",
            op.symbol(),
            compiler.logic().name()
        ));
    }
    base::aggregation(compiler, expr, ctx, fuzzy(compiler))
}

fn control(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    ctx.warn(format!(
        "`if` replaced by {} if-then-else; all branches are evaluated",
        compiler.logic().name()
    ));
    base::control(compiler, expr, ctx, fuzzy(compiler))
}

fn kron_delta(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    ctx.warn("KronDelta collapsed to its argument");
    base::passthrough(compiler, expr, ctx)
}

fn unsupported(
    _: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    Err(CompileError::NotImplemented {
        construct: format!("no reparameterization implemented for {}", expr.label()),
        location: ctx.location(),
    })
}
