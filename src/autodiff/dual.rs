//! Forward-mode dual numbers
//!
//! A [`Dual`] carries a value and its partial derivatives with respect to
//! every plan parameter. An empty partial vector stands for a constant, so
//! rollouts evaluated without gradient tracking pay no extra cost.

use std::ops::{Add, Div, Mul, Neg, Sub};

/// Value with dense partial derivatives
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dual {
    value: f64,
    grad: Vec<f64>,
}

impl Dual {
    /// A constant (zero gradient)
    pub fn constant(value: f64) -> Self {
        Self {
            value,
            grad: Vec::new(),
        }
    }

    /// The `index`-th of `n` independent variables
    pub fn variable(value: f64, index: usize, n: usize) -> Self {
        let mut grad = vec![0.0; n];
        grad[index] = 1.0;
        Self { value, grad }
    }

    /// Forward value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Partial derivatives (empty for constants)
    pub fn grad(&self) -> &[f64] {
        &self.grad
    }

    /// Partial derivative with respect to variable `index`
    pub fn partial(&self, index: usize) -> f64 {
        self.grad.get(index).copied().unwrap_or(0.0)
    }

    /// True if no gradient flows through this value
    pub fn is_constant(&self) -> bool {
        self.grad.iter().all(|g| *g == 0.0)
    }

    /// Apply a scalar function given its derivative at `self`
    fn chain(&self, value: f64, derivative: f64) -> Self {
        let grad = if self.grad.is_empty() || derivative == 0.0 {
            Vec::new()
        } else {
            self.grad.iter().map(|g| scale(*g, derivative)).collect()
        };
        Self { value, grad }
    }

    /// Combine two gradients as `da * a + db * b`
    fn combine(value: f64, a: &Self, da: f64, b: &Self, db: f64) -> Self {
        let grad = match (a.grad.is_empty(), b.grad.is_empty()) {
            (true, true) => Vec::new(),
            (false, true) => a.grad.iter().map(|g| scale(*g, da)).collect(),
            (true, false) => b.grad.iter().map(|g| scale(*g, db)).collect(),
            (false, false) => {
                let n = a.grad.len().max(b.grad.len());
                (0..n)
                    .map(|i| scale(a.partial(i), da) + scale(b.partial(i), db))
                    .collect()
            }
        };
        Self { value, grad }
    }

    pub fn exp(&self) -> Self {
        let v = self.value.exp();
        self.chain(v, v)
    }

    pub fn ln(&self) -> Self {
        self.chain(self.value.ln(), 1.0 / self.value)
    }

    pub fn sqrt(&self) -> Self {
        let v = self.value.sqrt();
        self.chain(v, 0.5 / v)
    }

    pub fn powf(&self, exponent: f64) -> Self {
        self.chain(
            self.value.powf(exponent),
            exponent * self.value.powf(exponent - 1.0),
        )
    }

    /// `self ^ exponent` where both operands may carry gradients
    pub fn pow(&self, exponent: &Self) -> Self {
        if exponent.grad.is_empty() {
            return self.powf(exponent.value);
        }
        let v = self.value.powf(exponent.value);
        let da = exponent.value * self.value.powf(exponent.value - 1.0);
        let db = if self.value > 0.0 {
            v * self.value.ln()
        } else {
            0.0
        };
        Self::combine(v, self, da, exponent, db)
    }

    pub fn sin(&self) -> Self {
        self.chain(self.value.sin(), self.value.cos())
    }

    pub fn cos(&self) -> Self {
        self.chain(self.value.cos(), -self.value.sin())
    }

    pub fn tanh(&self) -> Self {
        let v = self.value.tanh();
        self.chain(v, 1.0 - v * v)
    }

    pub fn abs(&self) -> Self {
        self.chain(self.value.abs(), self.value.signum())
    }

    /// Logistic function `1 / (1 + e^-x)`
    pub fn sigmoid(&self) -> Self {
        let v = sigmoid(self.value);
        self.chain(v, v * (1.0 - v))
    }

    /// Piecewise constant functions have zero gradient almost everywhere
    pub fn floor(&self) -> Self {
        Self::constant(self.value.floor())
    }

    pub fn ceil(&self) -> Self {
        Self::constant(self.value.ceil())
    }

    pub fn round(&self) -> Self {
        Self::constant(self.value.round())
    }

    pub fn signum(&self) -> Self {
        Self::constant(if self.value == 0.0 {
            0.0
        } else {
            self.value.signum()
        })
    }

    /// Minimum; the gradient routes through the smaller operand
    pub fn min(&self, other: &Self) -> Self {
        if self.value <= other.value {
            self.clone()
        } else {
            other.clone()
        }
    }

    /// Maximum; the gradient routes through the larger operand
    pub fn max(&self, other: &Self) -> Self {
        if self.value >= other.value {
            self.clone()
        } else {
            other.clone()
        }
    }

    /// `1 - self`
    pub fn complement(&self) -> Self {
        self.chain(1.0 - self.value, -1.0)
    }
}

/// Partial times local derivative; a zero partial stays zero even where the
/// derivative is infinite
fn scale(partial: f64, derivative: f64) -> f64 {
    if partial == 0.0 {
        0.0
    } else {
        partial * derivative
    }
}

/// Scalar logistic function
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl From<f64> for Dual {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl<'a> Add<&'a Dual> for &'a Dual {
    type Output = Dual;

    fn add(self, rhs: &'a Dual) -> Dual {
        Dual::combine(self.value + rhs.value, self, 1.0, rhs, 1.0)
    }
}

impl<'a> Sub<&'a Dual> for &'a Dual {
    type Output = Dual;

    fn sub(self, rhs: &'a Dual) -> Dual {
        Dual::combine(self.value - rhs.value, self, 1.0, rhs, -1.0)
    }
}

impl<'a> Mul<&'a Dual> for &'a Dual {
    type Output = Dual;

    fn mul(self, rhs: &'a Dual) -> Dual {
        Dual::combine(self.value * rhs.value, self, rhs.value, rhs, self.value)
    }
}

impl<'a> Div<&'a Dual> for &'a Dual {
    type Output = Dual;

    fn div(self, rhs: &'a Dual) -> Dual {
        let v = self.value / rhs.value;
        Dual::combine(v, self, 1.0 / rhs.value, rhs, -v / rhs.value)
    }
}

impl Neg for &Dual {
    type Output = Dual;

    fn neg(self) -> Dual {
        self.chain(-self.value, -1.0)
    }
}

macro_rules! forward_owned_binop {
    ($($trait:ident::$method:ident),*) => {
        $(
            impl $trait<Dual> for Dual {
                type Output = Dual;

                fn $method(self, rhs: Dual) -> Dual {
                    (&self).$method(&rhs)
                }
            }

            impl $trait<f64> for &Dual {
                type Output = Dual;

                fn $method(self, rhs: f64) -> Dual {
                    self.$method(&Dual::constant(rhs))
                }
            }
        )*
    };
}

forward_owned_binop!(Add::add, Sub::sub, Mul::mul, Div::div);

impl Neg for Dual {
    type Output = Dual;

    fn neg(self) -> Dual {
        -&self
    }
}
