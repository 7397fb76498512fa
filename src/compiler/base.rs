//! Exact semantics for every node kind
//!
//! Logical and relational operators yield hard 0/1 values, `if` selects a
//! branch, quantifiers are exact all/any. Continuous distributions are
//! reparameterized so gradients flow through their parameters; discrete
//! ones sample hard values. The logical, aggregation and control builders
//! are shared with the relaxed compiler through [`Truth`].

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Exp1, Gamma, Poisson, StandardNormal};

use super::{Bindings, Builder, CompileContext, CompiledExpr, CompiledNode, Compiler};
use crate::autodiff::{broadcast_shapes, numel, Dual, Tensor};
use crate::error::{CompileError, CompileResult};
use crate::logic::FuzzyLogic;
use crate::model::{
    AggregationOp, ArithmeticOp, ControlOp, DistributionKind, ErrorCodes, Expr, FunctionOp,
    LogicalOp, NodeKind, RelationalOp,
};
use crate::random::RngKey;

/// Builders for the base dispatch table
pub fn entries() -> Vec<(NodeKind, Builder)> {
    use DistributionKind::*;

    let mut entries = vec![
        entry(NodeKind::Constant, constant),
        entry(NodeKind::Variable, variable),
        entry(NodeKind::Arithmetic, arithmetic),
        entry(NodeKind::Relational, relational),
        entry(NodeKind::Logical, exact_logical),
        entry(NodeKind::Aggregation, exact_aggregation),
        entry(NodeKind::Function, function),
        entry(NodeKind::Control, exact_control),
    ];
    for dist in [
        KronDelta,
        DiracDelta,
        Normal,
        Uniform,
        Exponential,
        Weibull,
        Bernoulli,
        Poisson,
        Gamma,
    ] {
        entries.push(entry(NodeKind::Distribution(dist), distribution));
    }
    entries
}

fn entry(kind: NodeKind, builder: Builder) -> (NodeKind, Builder) {
    (kind, builder)
}

/// Truth semantics shared by the exact and relaxed builders
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truth {
    /// Hard Boolean logic on "value is non-zero"
    Exact,
    /// Fuzzy relaxation on values in [0, 1]
    Fuzzy(FuzzyLogic),
}

impl Truth {
    fn holds(x: &Dual) -> bool {
        x.value() != 0.0
    }

    fn boolean(value: bool) -> Dual {
        Dual::constant(if value { 1.0 } else { 0.0 })
    }

    pub fn not(self, x: &Dual) -> Dual {
        match self {
            Self::Exact => Self::boolean(!Self::holds(x)),
            Self::Fuzzy(logic) => logic.not(x),
        }
    }

    pub fn and(self, a: &Dual, b: &Dual) -> Dual {
        match self {
            Self::Exact => Self::boolean(Self::holds(a) && Self::holds(b)),
            Self::Fuzzy(logic) => logic.and(a, b),
        }
    }

    pub fn or(self, a: &Dual, b: &Dual) -> Dual {
        match self {
            Self::Exact => Self::boolean(Self::holds(a) || Self::holds(b)),
            Self::Fuzzy(logic) => logic.or(a, b),
        }
    }

    pub fn xor(self, a: &Dual, b: &Dual) -> Dual {
        match self {
            Self::Exact => Self::boolean(Self::holds(a) ^ Self::holds(b)),
            Self::Fuzzy(logic) => logic.xor(a, b),
        }
    }

    pub fn implies(self, a: &Dual, b: &Dual) -> Dual {
        match self {
            Self::Exact => Self::boolean(!Self::holds(a) || Self::holds(b)),
            Self::Fuzzy(logic) => logic.implies(a, b),
        }
    }

    /// Relaxed operands are already in [0, 1], so equivalence stays an exact test
    pub fn equivalent(self, a: &Dual, b: &Dual) -> Dual {
        match self {
            Self::Exact => Self::boolean(Self::holds(a) == Self::holds(b)),
            Self::Fuzzy(_) => Self::boolean(a.value() == b.value()),
        }
    }

    pub fn forall(self, x: &[Dual]) -> Dual {
        match self {
            Self::Exact => Self::boolean(x.iter().all(Self::holds)),
            Self::Fuzzy(logic) => logic.forall(x),
        }
    }

    pub fn exists(self, x: &[Dual]) -> Dual {
        match self {
            Self::Exact => Self::boolean(x.iter().any(Self::holds)),
            Self::Fuzzy(logic) => logic.exists(x),
        }
    }

    pub fn select(self, p: &Dual, a: &Dual, b: &Dual) -> Dual {
        match self {
            Self::Exact if Self::holds(p) => a.clone(),
            Self::Exact => b.clone(),
            Self::Fuzzy(logic) => logic.if_then_else(p, a, b),
        }
    }

    /// Flag operands a fuzzy connective cannot interpret as truth values
    fn check_operands(self, values: &[Tensor]) -> ErrorCodes {
        match self {
            Self::Exact => ErrorCodes::NORMAL,
            Self::Fuzzy(_) => ErrorCodes::when(
                values.iter().any(|t| t.any(|v| !(0.0..=1.0).contains(&v))),
                ErrorCodes::INVALID_FUZZY_OPERAND,
            ),
        }
    }
}

/// Evaluate nodes left to right, threading the key and OR-ing error codes
pub fn eval_all(
    evals: &[CompiledExpr],
    x: &Bindings,
    key: RngKey,
) -> (Vec<Tensor>, RngKey, ErrorCodes) {
    let mut key = key;
    let mut err = ErrorCodes::NORMAL;
    let mut values = Vec::with_capacity(evals.len());
    for eval in evals {
        let (value, next, e) = eval(x, key);
        key = next;
        err |= e;
        values.push(value);
    }
    (values, key, err)
}

fn zip(a: &Tensor, b: &Tensor, f: impl Fn(&Dual, &Dual) -> Dual) -> (Tensor, ErrorCodes) {
    match a.zip_map(b, f) {
        Some(t) => (t, ErrorCodes::NORMAL),
        None => (a.clone(), ErrorCodes::SHAPE_MISMATCH),
    }
}

fn unexpected(expr: &Expr, ctx: &CompileContext<'_>) -> CompileError {
    CompileError::InvalidOperator {
        op: expr.label(),
        location: ctx.location(),
    }
}

fn arity(op: &str, expected: &str, actual: usize, ctx: &CompileContext<'_>) -> CompileError {
    CompileError::ArityMismatch {
        op: op.to_string(),
        expected: expected.to_string(),
        actual,
        location: ctx.location(),
    }
}

fn joint_shape(nodes: &[CompiledNode], ctx: &CompileContext<'_>) -> CompileResult<Vec<usize>> {
    nodes
        .iter()
        .try_fold(Vec::new(), |acc, n| ctx.broadcast(&acc, &n.shape))
}

fn evals_of(nodes: Vec<CompiledNode>) -> Vec<CompiledExpr> {
    nodes.into_iter().map(|n| n.eval).collect()
}

fn constant(
    _: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    let Expr::Constant { value } = expr else {
        return Err(unexpected(expr, ctx));
    };
    let value = *value;
    Ok(CompiledNode::new(Vec::new(), move |_, key| {
        (Tensor::constant(value), key, ErrorCodes::NORMAL)
    }))
}

fn variable(
    _: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    let Expr::Variable { name } = expr else {
        return Err(unexpected(expr, ctx));
    };
    let shape = ctx
        .shape_of(name)
        .ok_or_else(|| CompileError::UnknownVariable {
            name: name.clone(),
            location: ctx.location(),
        })?
        .to_vec();
    let name = name.clone();
    let fallback = shape.clone();
    Ok(CompiledNode::new(shape, move |x, key| {
        let value = x
            .get(&name)
            .cloned()
            .unwrap_or_else(|| Tensor::filled(&fallback, 0.0));
        (value, key, ErrorCodes::NORMAL)
    }))
}

fn arithmetic(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    let Expr::Arithmetic { op, args } = expr else {
        return Err(unexpected(expr, ctx));
    };
    let op = *op;
    let mut nodes = compiler.compile_args(args, ctx)?;

    match (op, nodes.len()) {
        (ArithmeticOp::Subtract, 1) => {
            let arg = nodes.remove(0);
            let eval = arg.eval;
            return Ok(CompiledNode::new(arg.shape, move |x, key| {
                let (value, key, err) = eval(x, key);
                (value.map(|d| -d), key, err)
            }));
        }
        (ArithmeticOp::Add | ArithmeticOp::Multiply, n) if n >= 2 => {}
        (ArithmeticOp::Subtract | ArithmeticOp::Divide, 2) => {}
        (_, n) => return Err(arity(op.symbol(), "2", n, ctx)),
    }

    let shape = joint_shape(&nodes, ctx)?;
    let evals = evals_of(nodes);
    Ok(CompiledNode::new(shape, move |x, key| {
        let (values, key, mut err) = eval_all(&evals, x, key);
        let mut values = values.into_iter();
        let first = values.next().unwrap_or_else(|| Tensor::constant(0.0));
        let result = values.fold(first, |acc, rhs| {
            if op == ArithmeticOp::Divide && rhs.any(|v| v == 0.0) {
                err |= ErrorCodes::DIVISION_BY_ZERO;
            }
            let (value, e) = zip(&acc, &rhs, |a, b| match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Subtract => a - b,
                ArithmeticOp::Multiply => a * b,
                ArithmeticOp::Divide => a / b,
            });
            err |= e;
            value
        });
        (result, key, err)
    }))
}

fn relational(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    let Expr::Relational { op, args } = expr else {
        return Err(unexpected(expr, ctx));
    };
    let op = *op;
    if args.len() != 2 {
        return Err(arity(op.symbol(), "2", args.len(), ctx));
    }
    let nodes = compiler.compile_args(args, ctx)?;
    let shape = joint_shape(&nodes, ctx)?;
    let evals = evals_of(nodes);
    Ok(CompiledNode::new(shape, move |x, key| {
        let (values, key, err) = eval_all(&evals, x, key);
        let (value, e) = zip(&values[0], &values[1], |a, b| {
            let (a, b) = (a.value(), b.value());
            let holds = match op {
                RelationalOp::Equal => a == b,
                RelationalOp::NotEqual => a != b,
                RelationalOp::Less => a < b,
                RelationalOp::LessEqual => a <= b,
                RelationalOp::Greater => a > b,
                RelationalOp::GreaterEqual => a >= b,
            };
            Truth::boolean(holds)
        });
        (value, key, err | e)
    }))
}

fn exact_logical(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    logical(compiler, expr, ctx, Truth::Exact)
}

/// Logical connectives under the given truth semantics
pub fn logical(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
    truth: Truth,
) -> CompileResult<CompiledNode> {
    let Expr::Logical { op, args } = expr else {
        return Err(unexpected(expr, ctx));
    };
    let op = *op;
    let n = args.len();
    match op {
        LogicalOp::Not if n != 1 => return Err(arity(op.symbol(), "1", n, ctx)),
        LogicalOp::And | LogicalOp::Or if n < 2 => {
            return Err(arity(op.symbol(), "at least 2", n, ctx))
        }
        LogicalOp::Xor | LogicalOp::Implies | LogicalOp::Equivalent if n != 2 => {
            return Err(arity(op.symbol(), "2", n, ctx))
        }
        _ => {}
    }

    let nodes = compiler.compile_args(args, ctx)?;
    let shape = joint_shape(&nodes, ctx)?;
    let evals = evals_of(nodes);
    Ok(CompiledNode::new(shape, move |x, key| {
        let (values, key, mut err) = eval_all(&evals, x, key);
        if op != LogicalOp::Equivalent {
            err |= truth.check_operands(&values);
        }
        if op == LogicalOp::Not {
            return (values[0].map(|v| truth.not(v)), key, err);
        }
        let mut values = values.into_iter();
        let first = values.next().unwrap_or_else(|| Tensor::constant(0.0));
        let result = values.fold(first, |acc, rhs| {
            let (value, e) = zip(&acc, &rhs, |a, b| match op {
                LogicalOp::And => truth.and(a, b),
                LogicalOp::Or => truth.or(a, b),
                LogicalOp::Xor => truth.xor(a, b),
                LogicalOp::Implies => truth.implies(a, b),
                LogicalOp::Equivalent | LogicalOp::Not => truth.equivalent(a, b),
            });
            err |= e;
            value
        });
        (result, key, err)
    }))
}

fn exact_aggregation(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    aggregation(compiler, expr, ctx, Truth::Exact)
}

/// Reductions over object axes; quantifiers follow `truth`
pub fn aggregation(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
    truth: Truth,
) -> CompileResult<CompiledNode> {
    let Expr::Aggregation { op, axes, arg } = expr else {
        return Err(unexpected(expr, ctx));
    };
    let op = *op;
    let node = compiler.compile_expr(arg, ctx)?;
    let rank = node.shape.len();
    if let Some(&axis) = axes.iter().find(|&&axis| axis >= rank) {
        return Err(CompileError::InvalidAxis {
            axis,
            rank,
            location: ctx.location(),
        });
    }
    let shape: Vec<usize> = if axes.is_empty() {
        Vec::new()
    } else {
        node.shape
            .iter()
            .enumerate()
            .filter(|(axis, _)| !axes.contains(axis))
            .map(|(_, dim)| *dim)
            .collect()
    };
    let quantifier = matches!(op, AggregationOp::Forall | AggregationOp::Exists);
    let axes = axes.clone();
    let eval = node.eval;
    Ok(CompiledNode::new(shape, move |x, key| {
        let (value, key, mut err) = eval(x, key);
        if quantifier {
            err |= truth.check_operands(std::slice::from_ref(&value));
        }
        let reduced = value.reduce(&axes, |group| reduce(op, truth, group));
        (reduced, key, err)
    }))
}

fn reduce(op: AggregationOp, truth: Truth, group: &[Dual]) -> Dual {
    let fold = |init: Dual, f: fn(&Dual, &Dual) -> Dual| {
        group.iter().fold(init, |acc, v| f(&acc, v))
    };
    match op {
        AggregationOp::Sum => fold(Dual::constant(0.0), |a, b| a + b),
        AggregationOp::Prod => fold(Dual::constant(1.0), |a, b| a * b),
        AggregationOp::Avg => {
            let n = group.len().max(1) as f64;
            &fold(Dual::constant(0.0), |a, b| a + b) / &Dual::constant(n)
        }
        AggregationOp::Min => match group.split_first() {
            Some((first, rest)) => rest.iter().fold(first.clone(), |acc, v| acc.min(v)),
            None => Dual::constant(f64::INFINITY),
        },
        AggregationOp::Max => match group.split_first() {
            Some((first, rest)) => rest.iter().fold(first.clone(), |acc, v| acc.max(v)),
            None => Dual::constant(f64::NEG_INFINITY),
        },
        AggregationOp::Forall => truth.forall(group),
        AggregationOp::Exists => truth.exists(group),
    }
}

fn function(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    let Expr::Function { op, args } = expr else {
        return Err(unexpected(expr, ctx));
    };
    let op = *op;
    if args.len() != op.arity() {
        return Err(arity(op.symbol(), &op.arity().to_string(), args.len(), ctx));
    }
    let nodes = compiler.compile_args(args, ctx)?;
    let shape = joint_shape(&nodes, ctx)?;
    let evals = evals_of(nodes);
    Ok(CompiledNode::new(shape, move |x, key| {
        let (values, key, mut err) = eval_all(&evals, x, key);
        let value = match op {
            FunctionOp::Pow | FunctionOp::Min | FunctionOp::Max => {
                if op == FunctionOp::Pow {
                    let invalid = values[0]
                        .zip_map(&values[1], |b, e| {
                            let bad = b.value() < 0.0 && e.value().fract() != 0.0;
                            Truth::boolean(bad)
                        })
                        .is_some_and(|t| t.any(|v| v != 0.0));
                    err |= ErrorCodes::when(invalid, ErrorCodes::DOMAIN_VIOLATION);
                }
                let (value, e) = zip(&values[0], &values[1], |a, b| match op {
                    FunctionOp::Pow => a.pow(b),
                    FunctionOp::Min => a.min(b),
                    _ => a.max(b),
                });
                err |= e;
                value
            }
            _ => {
                let arg = &values[0];
                let invalid = match op {
                    FunctionOp::Ln => arg.any(|v| v <= 0.0),
                    FunctionOp::Sqrt => arg.any(|v| v < 0.0),
                    _ => false,
                };
                err |= ErrorCodes::when(invalid, ErrorCodes::DOMAIN_VIOLATION);
                arg.map(|a| match op {
                    FunctionOp::Exp => a.exp(),
                    FunctionOp::Ln => a.ln(),
                    FunctionOp::Sqrt => a.sqrt(),
                    FunctionOp::Abs => a.abs(),
                    FunctionOp::Sin => a.sin(),
                    FunctionOp::Cos => a.cos(),
                    FunctionOp::Tanh => a.tanh(),
                    FunctionOp::Floor => a.floor(),
                    FunctionOp::Ceil => a.ceil(),
                    FunctionOp::Round => a.round(),
                    _ => a.signum(),
                })
            }
        };
        (value, key, err)
    }))
}

fn exact_control(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    control(compiler, expr, ctx, Truth::Exact)
}

/// `if(pred, then, else)` under the given truth semantics.
///
/// The predicate and both branches are always evaluated, in that order, and
/// the error codes of all three are OR-ed into the result whichever branch
/// the predicate favours. Every branch therefore stays in the
/// differentiable graph and surfaces its anomalies.
pub fn control(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
    truth: Truth,
) -> CompileResult<CompiledNode> {
    let Expr::Control {
        op: ControlOp::If,
        args,
    } = expr
    else {
        return Err(unexpected(expr, ctx));
    };
    if args.len() != 3 {
        return Err(arity("if", "3", args.len(), ctx));
    }
    let nodes = compiler.compile_args(args, ctx)?;
    let shape = joint_shape(&nodes, ctx)?;
    let evals = evals_of(nodes);
    Ok(CompiledNode::new(shape, move |x, key| {
        let (values, key, err) = eval_all(&evals, x, key);
        match values[0].zip3_map(&values[1], &values[2], |p, a, b| truth.select(p, a, b)) {
            Some(value) => (value, key, err),
            None => (values[1].clone(), key, err | ErrorCodes::SHAPE_MISMATCH),
        }
    }))
}

fn distribution(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    let Expr::Distribution { dist, args } = expr else {
        return Err(unexpected(expr, ctx));
    };
    match dist {
        DistributionKind::KronDelta | DistributionKind::DiracDelta => {
            passthrough(compiler, expr, ctx)
        }
        _ => sampled(compiler, *dist, args, ctx),
    }
}

/// Deterministic point mass: the value of its single argument
pub fn passthrough(
    compiler: &Compiler,
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    let Expr::Distribution { dist, args } = expr else {
        return Err(unexpected(expr, ctx));
    };
    if args.len() != 1 {
        return Err(arity(dist.name(), "1", args.len(), ctx));
    }
    compiler.compile_expr(&args[0], ctx)
}

fn sampled(
    compiler: &Compiler,
    dist: DistributionKind,
    args: &[Expr],
    ctx: &mut CompileContext<'_>,
) -> CompileResult<CompiledNode> {
    if args.len() != dist.arity() {
        return Err(arity(
            dist.name(),
            &dist.arity().to_string(),
            args.len(),
            ctx,
        ));
    }
    let nodes = compiler.compile_args(args, ctx)?;
    let shape = joint_shape(&nodes, ctx)?;
    let evals = evals_of(nodes);
    let fallback = shape.clone();
    Ok(CompiledNode::new(shape, move |x, key| {
        let (params, key, err) = eval_all(&evals, x, key);
        let (key, subkey) = key.split();
        let mut rng = subkey.rng();
        match draw(dist, &params, &mut rng) {
            Some((sample, flags)) => (sample, key, err | flags),
            None => (
                Tensor::filled(&fallback, 0.0),
                key,
                err | ErrorCodes::SHAPE_MISMATCH,
            ),
        }
    }))
}

/// Draw one sample per element of the broadcast parameter shape
fn draw(
    dist: DistributionKind,
    params: &[Tensor],
    rng: &mut StdRng,
) -> Option<(Tensor, ErrorCodes)> {
    let mut flags = ErrorCodes::NORMAL;
    let sample = sample_elementwise(params, rng, |p, rng| match dist {
        DistributionKind::Normal => {
            let (mean, variance) = (&p[0], &p[1]);
            flags |= ErrorCodes::when(variance.value() < 0.0, ErrorCodes::INVALID_PARAM_NORMAL);
            let std = if variance.value() > 0.0 {
                variance.sqrt()
            } else {
                Dual::constant(0.0)
            };
            let eps: f64 = rng.sample(StandardNormal);
            mean + &(&std * eps)
        }
        DistributionKind::Uniform => {
            let (low, high) = (&p[0], &p[1]);
            flags |= ErrorCodes::when(low.value() > high.value(), ErrorCodes::INVALID_PARAM_UNIFORM);
            let u: f64 = rng.gen();
            low + &(&(high - low) * u)
        }
        DistributionKind::Exponential => {
            let scale = &p[0];
            flags |= ErrorCodes::when(scale.value() <= 0.0, ErrorCodes::INVALID_PARAM_EXPONENTIAL);
            let e: f64 = rng.sample(Exp1);
            scale * e
        }
        DistributionKind::Weibull => {
            let (shape, scale) = (&p[0], &p[1]);
            flags |= ErrorCodes::when(
                shape.value() <= 0.0 || scale.value() <= 0.0,
                ErrorCodes::INVALID_PARAM_WEIBULL,
            );
            let e: f64 = rng.sample(Exp1);
            let inverse = &Dual::constant(1.0) / shape;
            scale * &Dual::constant(e).pow(&inverse)
        }
        DistributionKind::Bernoulli => {
            let prob = p[0].value();
            flags |= ErrorCodes::when(
                !(0.0..=1.0).contains(&prob),
                ErrorCodes::INVALID_PARAM_BERNOULLI,
            );
            let u: f64 = rng.gen();
            Truth::boolean(u < prob)
        }
        DistributionKind::Poisson => {
            let rate = p[0].value();
            flags |= ErrorCodes::when(rate < 0.0, ErrorCodes::INVALID_PARAM_POISSON);
            let count = Poisson::new(rate).map(|d| d.sample(rng)).unwrap_or(0.0);
            Dual::constant(count)
        }
        DistributionKind::Gamma => {
            let (shape, scale) = (p[0].value(), p[1].value());
            flags |= ErrorCodes::when(
                shape <= 0.0 || scale <= 0.0,
                ErrorCodes::INVALID_PARAM_GAMMA,
            );
            let value = Gamma::new(shape, scale).map(|d| d.sample(rng)).unwrap_or(0.0);
            Dual::constant(value)
        }
        DistributionKind::KronDelta | DistributionKind::DiracDelta => p[0].clone(),
    })?;
    Some((sample, flags))
}

fn sample_elementwise(
    params: &[Tensor],
    rng: &mut StdRng,
    mut draw: impl FnMut(&[Dual], &mut StdRng) -> Dual,
) -> Option<Tensor> {
    let shape = params
        .iter()
        .try_fold(Vec::new(), |acc, p| broadcast_shapes(&acc, p.shape()))?;
    let expanded = params
        .iter()
        .map(|p| p.broadcast_to(&shape))
        .collect::<Option<Vec<_>>>()?;
    let data = (0..numel(&shape))
        .map(|i| {
            let args: Vec<Dual> = expanded.iter().map(|t| t.data()[i].clone()).collect();
            draw(&args, rng)
        })
        .collect();
    Tensor::from_duals(shape, data)
}
