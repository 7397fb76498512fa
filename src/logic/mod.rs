//! Fuzzy relaxations of Boolean logic
//!
//! Each variant supplies three primitives, AND, FORALL and IF-THEN-ELSE, as
//! a [`LogicOps`] table. NOT is fixed to `1 - x` for every variant, and OR,
//! XOR, IMPLIES and EXISTS are always derived from NOT/AND/FORALL so that a
//! variant cannot make them disagree with its own primitives.

pub mod minimum;
pub mod product;

use serde::{Deserialize, Serialize};

use crate::autodiff::{Dual, Tensor};

/// Primitive operations of a relaxation, operating on values in [0, 1]
#[derive(Clone, Copy)]
pub struct LogicOps {
    pub name: &'static str,
    pub and: fn(&Dual, &Dual) -> Dual,
    pub forall: fn(&[Dual]) -> Dual,
    pub if_then_else: fn(&Dual, &Dual, &Dual) -> Dual,
}

impl std::fmt::Debug for LogicOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicOps").field("name", &self.name).finish()
    }
}

/// Selectable relaxation variant
///
/// Derived operators go through `1 - x`, so they agree with their closed
/// forms only up to rounding: minimum OR of 0.1 and 0.2 is
/// `0.19999999999999996`, not `0.2`, and product OR differs from
/// `a + b - a * b` in the last bits. Compare results with a tolerance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyLogic {
    /// Product t-norm: AND = a * b
    #[default]
    Product,
    /// Goedel t-norm: AND = min(a, b)
    Minimum,
}

impl FuzzyLogic {
    /// The primitive table of this variant
    pub fn ops(self) -> &'static LogicOps {
        match self {
            Self::Product => &product::OPS,
            Self::Minimum => &minimum::OPS,
        }
    }

    pub fn name(self) -> &'static str {
        self.ops().name
    }

    pub fn not(self, x: &Dual) -> Dual {
        x.complement()
    }

    pub fn and(self, a: &Dual, b: &Dual) -> Dual {
        (self.ops().and)(a, b)
    }

    pub fn or(self, a: &Dual, b: &Dual) -> Dual {
        self.not(&self.and(&self.not(a), &self.not(b)))
    }

    pub fn xor(self, a: &Dual, b: &Dual) -> Dual {
        self.and(&self.or(a, b), &self.not(&self.and(a, b)))
    }

    pub fn implies(self, a: &Dual, b: &Dual) -> Dual {
        self.or(&self.not(a), b)
    }

    pub fn forall(self, x: &[Dual]) -> Dual {
        (self.ops().forall)(x)
    }

    pub fn exists(self, x: &[Dual]) -> Dual {
        let negated: Vec<Dual> = x.iter().map(|v| self.not(v)).collect();
        self.not(&self.forall(&negated))
    }

    /// Soft selection between `a` and `b` by truth value `p`
    pub fn if_then_else(self, p: &Dual, a: &Dual, b: &Dual) -> Dual {
        (self.ops().if_then_else)(p, a, b)
    }

    /// FORALL over `axes` of an object-indexed tensor (all axes if empty)
    pub fn forall_over(self, x: &Tensor, axes: &[usize]) -> Tensor {
        x.reduce(axes, |group| self.forall(group))
    }

    /// EXISTS over `axes` of an object-indexed tensor (all axes if empty)
    pub fn exists_over(self, x: &Tensor, axes: &[usize]) -> Tensor {
        x.reduce(axes, |group| self.exists(group))
    }
}

/// `p * a + (1 - p) * b`, shared by both variants
pub(crate) fn linear_if_then_else(p: &Dual, a: &Dual, b: &Dual) -> Dual {
    &(p * a) + &(&p.complement() * b)
}

pub mod prelude {
    pub use super::FuzzyLogic;
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGICS: [FuzzyLogic; 2] = [FuzzyLogic::Product, FuzzyLogic::Minimum];

    fn c(v: f64) -> Dual {
        Dual::constant(v)
    }

    fn grid() -> Vec<f64> {
        (0..=10).map(|i| i as f64 / 10.0).collect()
    }

    #[test]
    fn test_agrees_with_boolean_logic_at_corners() {
        for logic in LOGICS {
            for a in [0.0, 1.0] {
                for b in [0.0, 1.0] {
                    let (ba, bb) = (a == 1.0, b == 1.0);
                    let and = logic.and(&c(a), &c(b)).value();
                    let or = logic.or(&c(a), &c(b)).value();
                    let xor = logic.xor(&c(a), &c(b)).value();
                    let implies = logic.implies(&c(a), &c(b)).value();
                    assert_eq!(and == 1.0, ba && bb, "{} and", logic.name());
                    assert_eq!(or == 1.0, ba || bb, "{} or", logic.name());
                    assert_eq!(xor == 1.0, ba ^ bb, "{} xor", logic.name());
                    assert_eq!(implies == 1.0, !ba || bb, "{} implies", logic.name());
                }
            }
        }
    }

    #[test]
    fn test_de_morgan_identities_on_grid() {
        for logic in LOGICS {
            for a in grid() {
                assert!((logic.not(&logic.not(&c(a))).value() - a).abs() < 1e-12);
                for b in grid() {
                    let or = logic.or(&c(a), &c(b)).value();
                    let de_morgan = logic
                        .not(&logic.and(&logic.not(&c(a)), &logic.not(&c(b))))
                        .value();
                    assert!((or - de_morgan).abs() < 1e-12);

                    let implies = logic.implies(&c(a), &c(b)).value();
                    let expected = logic.or(&logic.not(&c(a)), &c(b)).value();
                    assert!((implies - expected).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_if_then_else_interpolates() {
        for logic in LOGICS {
            let r = logic.if_then_else(&c(0.25), &c(4.0), &c(8.0));
            assert!((r.value() - 7.0).abs() < 1e-12);
            assert_eq!(logic.if_then_else(&c(1.0), &c(4.0), &c(8.0)).value(), 4.0);
            assert_eq!(logic.if_then_else(&c(0.0), &c(4.0), &c(8.0)).value(), 8.0);
        }
    }

    #[test]
    fn test_if_then_else_gradient_reaches_predicate() {
        let p = Dual::variable(0.5, 0, 1);
        for logic in LOGICS {
            let r = logic.if_then_else(&p, &c(3.0), &c(1.0));
            assert!((r.partial(0) - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_derived_or_matches_closed_form_within_rounding() {
        for a in grid() {
            for b in grid() {
                let min_or = FuzzyLogic::Minimum.or(&c(a), &c(b)).value();
                let prod_or = FuzzyLogic::Product.or(&c(a), &c(b)).value();
                assert!((min_or - a.max(b)).abs() < 1e-15);
                assert!((prod_or - (a + b - a * b)).abs() < 1e-15);
            }
        }
        let exists = FuzzyLogic::Minimum.exists(&[c(0.1), c(0.2)]).value();
        assert!((exists - 0.2).abs() < 1e-15);
    }

    #[test]
    fn test_forall_boundaries() {
        for logic in LOGICS {
            assert_eq!(logic.forall(&[c(1.0), c(1.0), c(1.0)]).value(), 1.0);
            assert_eq!(logic.forall(&[c(0.9), c(0.0), c(1.0)]).value(), 0.0);
            assert_eq!(logic.forall(&[]).value(), 1.0);
        }
    }

    #[test]
    fn test_forall_over_axis() {
        let x = Tensor::from_duals(
            vec![2, 2],
            vec![c(1.0), c(1.0), c(0.0), c(1.0)],
        )
        .unwrap();
        for logic in LOGICS {
            let rows = logic.forall_over(&x, &[1]);
            assert_eq!(rows.shape(), &[2]);
            assert_eq!(rows.data()[0].value(), 1.0);
            assert_eq!(rows.data()[1].value(), 0.0);

            let any = logic.exists_over(&x, &[]);
            assert!(any.is_scalar());
            assert!((any.item().value() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_default_is_product() {
        assert_eq!(FuzzyLogic::default(), FuzzyLogic::Product);
    }
}
