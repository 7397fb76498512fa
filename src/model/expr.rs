//! Symbolic expression trees
//!
//! An [`Expr`] is the parsed form of a CPF or reward expression. Nodes are
//! grouped into kinds ([`NodeKind`]) which the compiler dispatches on.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Arithmetic operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Relational operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationalOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// Logical connectives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
    Xor,
    Implies,
    Equivalent,
    Not,
}

/// Reductions over object-indexed axes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationOp {
    Sum,
    Avg,
    Prod,
    Min,
    Max,
    Forall,
    Exists,
}

/// Built-in numeric functions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionOp {
    Exp,
    Ln,
    Sqrt,
    Abs,
    Sin,
    Cos,
    Tanh,
    Pow,
    Min,
    Max,
    Floor,
    Ceil,
    Round,
    Sgn,
}

/// Control-flow operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOp {
    If,
}

/// Probability distributions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionKind {
    KronDelta,
    DiracDelta,
    /// `Normal(mean, variance)`
    Normal,
    /// `Uniform(low, high)`
    Uniform,
    /// `Exponential(scale)`
    Exponential,
    /// `Weibull(shape, scale)`
    Weibull,
    /// `Bernoulli(p)`
    Bernoulli,
    /// `Poisson(rate)`
    Poisson,
    /// `Gamma(shape, scale)`
    Gamma,
}

/// Node of a symbolic expression
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Expr {
    Constant {
        value: f64,
    },
    Variable {
        name: String,
    },
    Arithmetic {
        op: ArithmeticOp,
        args: Vec<Expr>,
    },
    Relational {
        op: RelationalOp,
        args: Vec<Expr>,
    },
    Logical {
        op: LogicalOp,
        args: Vec<Expr>,
    },
    Aggregation {
        op: AggregationOp,
        #[serde(default)]
        axes: Vec<usize>,
        arg: Box<Expr>,
    },
    Function {
        op: FunctionOp,
        args: Vec<Expr>,
    },
    Control {
        op: ControlOp,
        args: Vec<Expr>,
    },
    Distribution {
        dist: DistributionKind,
        args: Vec<Expr>,
    },
}

/// Dispatch key for the compiler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Constant,
    Variable,
    Arithmetic,
    Relational,
    Logical,
    Aggregation,
    Function,
    Control,
    Distribution(DistributionKind),
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }
}

impl RelationalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "~=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
        }
    }
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::And => "^",
            Self::Or => "|",
            Self::Xor => "~",
            Self::Implies => "=>",
            Self::Equivalent => "<=>",
            Self::Not => "not",
        }
    }
}

impl AggregationOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Prod => "prod",
            Self::Min => "min",
            Self::Max => "max",
            Self::Forall => "forall",
            Self::Exists => "exists",
        }
    }
}

impl FunctionOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Exp => "exp",
            Self::Ln => "ln",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tanh => "tanh",
            Self::Pow => "pow",
            Self::Min => "min",
            Self::Max => "max",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Round => "round",
            Self::Sgn => "sgn",
        }
    }

    /// Number of arguments the function takes
    pub fn arity(self) -> usize {
        match self {
            Self::Pow | Self::Min | Self::Max => 2,
            _ => 1,
        }
    }
}

impl DistributionKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::KronDelta => "KronDelta",
            Self::DiracDelta => "DiracDelta",
            Self::Normal => "Normal",
            Self::Uniform => "Uniform",
            Self::Exponential => "Exponential",
            Self::Weibull => "Weibull",
            Self::Bernoulli => "Bernoulli",
            Self::Poisson => "Poisson",
            Self::Gamma => "Gamma",
        }
    }

    /// Number of parameters the distribution takes
    pub fn arity(self) -> usize {
        match self {
            Self::Normal | Self::Uniform | Self::Weibull | Self::Gamma => 2,
            _ => 1,
        }
    }
}

impl Expr {
    pub fn constant(value: f64) -> Self {
        Self::Constant { value }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable { name: name.into() }
    }

    pub fn arithmetic(op: ArithmeticOp, args: Vec<Expr>) -> Self {
        Self::Arithmetic { op, args }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::arithmetic(ArithmeticOp::Add, vec![lhs, rhs])
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Self::arithmetic(ArithmeticOp::Subtract, vec![lhs, rhs])
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Self::arithmetic(ArithmeticOp::Multiply, vec![lhs, rhs])
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Self {
        Self::arithmetic(ArithmeticOp::Divide, vec![lhs, rhs])
    }

    /// Unary minus
    pub fn neg(arg: Expr) -> Self {
        Self::arithmetic(ArithmeticOp::Subtract, vec![arg])
    }

    pub fn relational(op: RelationalOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Relational {
            op,
            args: vec![lhs, rhs],
        }
    }

    pub fn logical(op: LogicalOp, args: Vec<Expr>) -> Self {
        Self::Logical { op, args }
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Self::logical(LogicalOp::And, vec![lhs, rhs])
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Self {
        Self::logical(LogicalOp::Or, vec![lhs, rhs])
    }

    pub fn implies(lhs: Expr, rhs: Expr) -> Self {
        Self::logical(LogicalOp::Implies, vec![lhs, rhs])
    }

    pub fn not(arg: Expr) -> Self {
        Self::logical(LogicalOp::Not, vec![arg])
    }

    pub fn aggregation(op: AggregationOp, axes: Vec<usize>, arg: Expr) -> Self {
        Self::Aggregation {
            op,
            axes,
            arg: Box::new(arg),
        }
    }

    pub fn function(op: FunctionOp, args: Vec<Expr>) -> Self {
        Self::Function { op, args }
    }

    pub fn if_then_else(pred: Expr, if_true: Expr, if_false: Expr) -> Self {
        Self::Control {
            op: ControlOp::If,
            args: vec![pred, if_true, if_false],
        }
    }

    pub fn distribution(dist: DistributionKind, args: Vec<Expr>) -> Self {
        Self::Distribution { dist, args }
    }

    pub fn normal(mean: Expr, variance: Expr) -> Self {
        Self::distribution(DistributionKind::Normal, vec![mean, variance])
    }

    pub fn uniform(low: Expr, high: Expr) -> Self {
        Self::distribution(DistributionKind::Uniform, vec![low, high])
    }

    pub fn bernoulli(p: Expr) -> Self {
        Self::distribution(DistributionKind::Bernoulli, vec![p])
    }

    pub fn kron_delta(arg: Expr) -> Self {
        Self::distribution(DistributionKind::KronDelta, vec![arg])
    }

    /// Dispatch key of this node
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Constant { .. } => NodeKind::Constant,
            Self::Variable { .. } => NodeKind::Variable,
            Self::Arithmetic { .. } => NodeKind::Arithmetic,
            Self::Relational { .. } => NodeKind::Relational,
            Self::Logical { .. } => NodeKind::Logical,
            Self::Aggregation { .. } => NodeKind::Aggregation,
            Self::Function { .. } => NodeKind::Function,
            Self::Control { .. } => NodeKind::Control,
            Self::Distribution { dist, .. } => NodeKind::Distribution(*dist),
        }
    }

    /// Direct children of this node
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Self::Constant { .. } | Self::Variable { .. } => Vec::new(),
            Self::Aggregation { arg, .. } => vec![arg.as_ref()],
            Self::Arithmetic { args, .. }
            | Self::Relational { args, .. }
            | Self::Logical { args, .. }
            | Self::Function { args, .. }
            | Self::Control { args, .. }
            | Self::Distribution { args, .. } => args.iter().collect(),
        }
    }

    /// Names of every variable referenced in the tree
    pub fn references(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references(&self, names: &mut BTreeSet<String>) {
        if let Self::Variable { name } = self {
            names.insert(name.clone());
        }
        for child in self.children() {
            child.collect_references(names);
        }
    }

    /// Short label used in compile locations and diagnostics
    pub fn label(&self) -> String {
        match self {
            Self::Constant { value } => value.to_string(),
            Self::Variable { name } => name.clone(),
            Self::Arithmetic { op, .. } => op.symbol().to_string(),
            Self::Relational { op, .. } => op.symbol().to_string(),
            Self::Logical { op, .. } => op.symbol().to_string(),
            Self::Aggregation { op, .. } => op.symbol().to_string(),
            Self::Function { op, .. } => op.symbol().to_string(),
            Self::Control { .. } => "if".to_string(),
            Self::Distribution { dist, .. } => dist.name().to_string(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant { .. } | Self::Variable { .. } => write!(f, "{}", self.label()),
            Self::Aggregation { op, axes, arg } => {
                write!(f, "{}{:?}[{}]", op.symbol(), axes, arg)
            }
            Self::Arithmetic { op, args } if args.len() == 2 => {
                write!(f, "({} {} {})", args[0], op.symbol(), args[1])
            }
            Self::Relational { op, args } if args.len() == 2 => {
                write!(f, "({} {} {})", args[0], op.symbol(), args[1])
            }
            Self::Logical { op, args } if args.len() == 2 => {
                write!(f, "({} {} {})", args[0], op.symbol(), args[1])
            }
            _ => {
                write!(f, "{}(", self.label())?;
                for (i, child) in self.children().into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}
