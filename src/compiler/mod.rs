//! Differentiable program compiler
//!
//! Expression trees are compiled into pure step functions
//! `(bindings, key) -> (value, key, error codes)`. Compilation dispatches on
//! [`NodeKind`] through a [`DispatchTable`]: the base table gives every node
//! its exact meaning, and the relaxed compiler overlays entries that swap
//! logic, branching and discrete sampling for smooth counterparts.

pub mod base;
pub mod relaxed;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::autodiff::{broadcast_shapes, Tensor};
use crate::error::{CompileError, CompileResult};
use crate::logic::FuzzyLogic;
use crate::model::{Domain, ErrorCodes, Expr, FluentKind, NodeKind};
use crate::random::RngKey;

/// Current value of every fluent, keyed by name
pub type Bindings = BTreeMap<String, Tensor>;

/// Output of one compiled expression
pub type Evaluation = (Tensor, RngKey, ErrorCodes);

/// A compiled expression
pub type CompiledExpr = Arc<dyn Fn(&Bindings, RngKey) -> Evaluation + Send + Sync>;

/// Builds the compiled form of one node kind
pub type Builder = fn(&Compiler, &Expr, &mut CompileContext<'_>) -> CompileResult<CompiledNode>;

/// Compiled expression together with its static shape
#[derive(Clone)]
pub struct CompiledNode {
    pub eval: CompiledExpr,
    pub shape: Vec<usize>,
}

impl CompiledNode {
    pub fn new(
        shape: Vec<usize>,
        eval: impl Fn(&Bindings, RngKey) -> Evaluation + Send + Sync + 'static,
    ) -> Self {
        Self {
            eval: Arc::new(eval),
            shape,
        }
    }
}

impl fmt::Debug for CompiledNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledNode")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Informational note about an approximated construct
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: String,
    pub message: String,
}

/// Mutable state threaded through one compilation
pub struct CompileContext<'a> {
    shapes: &'a HashMap<String, Vec<usize>>,
    path: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CompileContext<'a> {
    pub fn new(shapes: &'a HashMap<String, Vec<usize>>, root: impl Into<String>) -> Self {
        Self {
            shapes,
            path: vec![root.into()],
            diagnostics: Vec::new(),
        }
    }

    /// Breadcrumb of the node being compiled
    pub fn location(&self) -> String {
        self.path.join(" > ")
    }

    pub fn shape_of(&self, name: &str) -> Option<&[usize]> {
        self.shapes.get(name).map(Vec::as_slice)
    }

    /// Record an approximation; never affects the compiled result
    pub fn warn(&mut self, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            location: self.location(),
            message: message.into(),
        };
        warn!(
            target: "relaxplan::relax",
            location = %diagnostic.location,
            "{}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }

    /// Broadcast two operand shapes or fail at the current location
    pub fn broadcast(&self, lhs: &[usize], rhs: &[usize]) -> CompileResult<Vec<usize>> {
        broadcast_shapes(lhs, rhs).ok_or_else(|| CompileError::ShapeMismatch {
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
            location: self.location(),
        })
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn reroot(&mut self, root: impl Into<String>) {
        self.path.clear();
        self.path.push(root.into());
    }
}

/// Node kind to builder mapping
#[derive(Clone)]
pub struct DispatchTable {
    entries: HashMap<NodeKind, Builder>,
}

impl DispatchTable {
    /// Exact semantics for every node kind
    pub fn base() -> Self {
        Self {
            entries: base::entries().into_iter().collect(),
        }
    }

    /// Replace the builder for `kind`
    pub fn with(mut self, kind: NodeKind, builder: Builder) -> Self {
        self.entries.insert(kind, builder);
        self
    }

    pub fn get(&self, kind: NodeKind) -> Option<Builder> {
        self.entries.get(&kind).copied()
    }
}

/// Expression compiler
#[derive(Clone)]
pub struct Compiler {
    table: DispatchTable,
    logic: FuzzyLogic,
}

impl Compiler {
    /// Exact (non-differentiable where the model is discrete) compiler
    pub fn exact() -> Self {
        Self {
            table: DispatchTable::base(),
            logic: FuzzyLogic::default(),
        }
    }

    /// Compiler with fuzzy relaxations of logic, branching and discrete sampling
    pub fn relaxed(logic: FuzzyLogic) -> Self {
        let table = relaxed::overrides()
            .into_iter()
            .fold(DispatchTable::base(), |table, (kind, builder)| {
                table.with(kind, builder)
            });
        Self { table, logic }
    }

    pub fn logic(&self) -> FuzzyLogic {
        self.logic
    }

    /// Compile one node, dispatching on its kind
    pub fn compile_expr(
        &self,
        expr: &Expr,
        ctx: &mut CompileContext<'_>,
    ) -> CompileResult<CompiledNode> {
        ctx.path.push(expr.label());
        let builder = self
            .table
            .get(expr.kind())
            .ok_or_else(|| CompileError::NotImplemented {
                construct: expr.label(),
                location: ctx.location(),
            })?;
        let node = builder(self, expr, ctx)?;
        ctx.path.pop();
        Ok(node)
    }

    /// Compile every argument in order
    pub fn compile_args(
        &self,
        args: &[Expr],
        ctx: &mut CompileContext<'_>,
    ) -> CompileResult<Vec<CompiledNode>> {
        args.iter().map(|arg| self.compile_expr(arg, ctx)).collect()
    }

    /// Compile all CPFs and the reward of a domain
    pub fn compile(&self, domain: &Domain) -> CompileResult<CompiledModel> {
        let shapes = shape_table(domain);
        let order = cpf_order(domain)?;
        let mut ctx = CompileContext::new(&shapes, "");

        let mut cpfs = Vec::with_capacity(order.len());
        for name in order {
            let Some(expr) = domain.cpfs.get(&name) else {
                continue;
            };
            ctx.reroot(format!("cpf {}", name));
            let node = self.compile_expr(expr, &mut ctx)?;
            let target = shapes.get(&name).cloned().unwrap_or_default();
            let eval = fit_to_shape(node, &target, &ctx)?;
            cpfs.push((name, eval));
        }

        ctx.reroot("reward");
        let reward = self.compile_expr(&domain.reward, &mut ctx)?;
        if !reward.shape.is_empty() {
            return Err(CompileError::NonScalarReward(reward.shape));
        }

        let init: Bindings = domain
            .fluents
            .iter()
            .map(|f| (f.name.clone(), f.initial_tensor()))
            .collect();

        debug!(
            domain = %domain.name,
            cpfs = cpfs.len(),
            diagnostics = ctx.diagnostics().len(),
            "compiled domain"
        );

        Ok(CompiledModel {
            cpfs,
            reward: reward.eval,
            init,
            primed_to_unprimed: domain.primed_to_unprimed(),
            diagnostics: ctx.into_diagnostics(),
        })
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("logic", &self.logic)
            .field("entries", &self.table.entries.len())
            .finish()
    }
}

/// Compiled transition and reward functions of a domain
#[derive(Clone)]
pub struct CompiledModel {
    /// CPFs in evaluation order
    pub cpfs: Vec<(String, CompiledExpr)>,
    pub reward: CompiledExpr,
    /// Initial value of every fluent
    pub init: Bindings,
    pub primed_to_unprimed: Vec<(String, String)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledModel {
    /// Names of the CPFs in evaluation order
    pub fn cpf_names(&self) -> Vec<&str> {
        self.cpfs.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl fmt::Debug for CompiledModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledModel")
            .field("cpfs", &self.cpf_names())
            .field("primed_to_unprimed", &self.primed_to_unprimed)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

/// Static shape of every name an expression may reference
fn shape_table(domain: &Domain) -> HashMap<String, Vec<usize>> {
    let mut shapes = HashMap::new();
    for fluent in &domain.fluents {
        if fluent.kind == FluentKind::State {
            shapes.insert(fluent.primed_name(), fluent.shape.clone());
        }
        shapes.insert(fluent.name.clone(), fluent.shape.clone());
    }
    shapes
}

/// Broadcast a CPF result up to the shape of the fluent it defines
fn fit_to_shape(
    node: CompiledNode,
    target: &[usize],
    ctx: &CompileContext<'_>,
) -> CompileResult<CompiledExpr> {
    if node.shape == target {
        return Ok(node.eval);
    }
    let shape = ctx.broadcast(&node.shape, target)?;
    if shape != target {
        return Err(CompileError::ShapeMismatch {
            lhs: node.shape,
            rhs: target.to_vec(),
            location: ctx.location(),
        });
    }
    let eval = node.eval;
    Ok(Arc::new(move |x: &Bindings, key: RngKey| {
        let (value, key, err) = eval(x, key);
        match value.broadcast_to(&shape) {
            Some(value) => (value, key, err),
            None => (value, key, err | ErrorCodes::SHAPE_MISMATCH),
        }
    }))
}

/// Dependency-respecting evaluation order of the CPFs, ties broken by name
pub fn cpf_order(domain: &Domain) -> CompileResult<Vec<String>> {
    let names: BTreeSet<&str> = domain.cpfs.keys().map(String::as_str).collect();
    let mut pending: BTreeMap<&str, BTreeSet<String>> = domain
        .cpfs
        .iter()
        .map(|(name, expr)| {
            let deps = expr
                .references()
                .into_iter()
                .filter(|r| names.contains(r.as_str()))
                .collect();
            (name.as_str(), deps)
        })
        .collect();

    let mut order = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready: Vec<&str> = pending
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(name, _)| *name)
            .collect();
        if ready.is_empty() {
            let cycle: Vec<&str> = pending.keys().copied().collect();
            return Err(CompileError::CyclicDependency(cycle.join(", ")));
        }
        for name in ready {
            pending.remove(name);
            for deps in pending.values_mut() {
                deps.remove(name);
            }
            order.push(name.to_string());
        }
    }
    Ok(order)
}

pub mod prelude {
    pub use super::{Bindings, CompiledModel, Compiler, Diagnostic};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fluent, ValueType};

    fn chain_domain() -> Domain {
        Domain::new("chain", Expr::var("total"))
            .with_fluent(Fluent::state("s", ValueType::Real, 1.0))
            .with_fluent(Fluent::new("boost", FluentKind::Interm, ValueType::Real))
            .with_fluent(Fluent::new("total", FluentKind::Derived, ValueType::Real))
            .with_fluent(Fluent::action("a", ValueType::Real))
            .with_cpf("total", Expr::add(Expr::var("s'"), Expr::var("boost")))
            .with_cpf("s'", Expr::add(Expr::var("s"), Expr::var("boost")))
            .with_cpf("boost", Expr::mul(Expr::var("a"), Expr::constant(2.0)))
    }

    #[test]
    fn test_cpf_order_respects_dependencies() {
        let order = cpf_order(&chain_domain()).unwrap();
        assert_eq!(order, vec!["boost", "s'", "total"]);
    }

    #[test]
    fn test_cpf_order_detects_cycles() {
        let domain = Domain::new("loop", Expr::constant(0.0))
            .with_fluent(Fluent::new("x", FluentKind::Interm, ValueType::Real))
            .with_fluent(Fluent::new("y", FluentKind::Interm, ValueType::Real))
            .with_cpf("x", Expr::var("y"))
            .with_cpf("y", Expr::var("x"));
        assert!(matches!(
            cpf_order(&domain),
            Err(CompileError::CyclicDependency(_))
        ));
    }

    #[test]
    fn test_compile_model() {
        let model = Compiler::exact().compile(&chain_domain()).unwrap();
        assert_eq!(model.cpf_names(), vec!["boost", "s'", "total"]);
        assert_eq!(
            model.primed_to_unprimed,
            vec![("s'".to_string(), "s".to_string())]
        );
        assert!(model.init.contains_key("a"));
        assert!(model.diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_variable_location() {
        let domain = Domain::new("d", Expr::add(Expr::var("ghost"), Expr::constant(1.0)));
        let err = Compiler::exact().compile(&domain).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownVariable {
                name: "ghost".to_string(),
                location: "reward > + > ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_non_scalar_reward() {
        let domain = Domain::new("d", Expr::var("v")).with_fluent(
            Fluent::non_fluent("v", ValueType::Real, 1.0).with_shape(vec![3]),
        );
        assert_eq!(
            Compiler::exact().compile(&domain).unwrap_err(),
            CompileError::NonScalarReward(vec![3])
        );
    }

    #[test]
    fn test_cpf_broadcast_to_fluent_shape() {
        let domain = Domain::new("d", Expr::constant(0.0))
            .with_fluent(Fluent::state("v", ValueType::Real, 0.0).with_shape(vec![2]))
            .with_cpf("v'", Expr::constant(3.0));
        let model = Compiler::exact().compile(&domain).unwrap();
        let (value, _, err) = (model.cpfs[0].1)(&model.init, RngKey::new(0));
        assert_eq!(value.shape(), &[2]);
        assert!(err.is_normal());
    }

    #[test]
    fn test_relaxed_table_overrides_control() {
        let exact = Compiler::exact();
        let relaxed = Compiler::relaxed(FuzzyLogic::Minimum);
        assert_eq!(relaxed.logic(), FuzzyLogic::Minimum);
        assert!(exact.table.get(NodeKind::Control).is_some());
        assert!(relaxed.table.get(NodeKind::Control).is_some());
    }
}
