//! Product t-norm
//!
//! Differentiable everywhere; gradients shrink multiplicatively as more
//! conjuncts approach zero.

use super::{linear_if_then_else, LogicOps};
use crate::autodiff::Dual;

pub static OPS: LogicOps = LogicOps {
    name: "product",
    and,
    forall,
    if_then_else: linear_if_then_else,
};

fn and(a: &Dual, b: &Dual) -> Dual {
    a * b
}

fn forall(x: &[Dual]) -> Dual {
    x.iter().fold(Dual::constant(1.0), |acc, v| &acc * v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::FuzzyLogic;

    #[test]
    fn test_derived_connectives_match_closed_forms() {
        let logic = FuzzyLogic::Product;
        let (a, b) = (Dual::constant(0.3), Dual::constant(0.6));
        let or = logic.or(&a, &b).value();
        assert!((or - (0.3 + 0.6 - 0.18)).abs() < 1e-12);
        let implies = logic.implies(&a, &b).value();
        assert!((implies - (1.0 - 0.3 * 0.4)).abs() < 1e-12);
    }

    #[test]
    fn test_forall_is_running_product() {
        let x = [Dual::constant(0.5), Dual::constant(0.5), Dual::constant(0.8)];
        assert!((forall(&x).value() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_and_gradient_flows_to_both() {
        let a = Dual::variable(0.5, 0, 2);
        let b = Dual::variable(0.25, 1, 2);
        assert_eq!(and(&a, &b).grad(), &[0.25, 0.5]);
    }
}
