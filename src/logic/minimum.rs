//! Goedel (minimum) t-norm
//!
//! Gradients are sparse: they route only through the active extremum.

use super::{linear_if_then_else, LogicOps};
use crate::autodiff::Dual;

pub static OPS: LogicOps = LogicOps {
    name: "minimum",
    and,
    forall,
    if_then_else: linear_if_then_else,
};

fn and(a: &Dual, b: &Dual) -> Dual {
    a.min(b)
}

fn forall(x: &[Dual]) -> Dual {
    match x.split_first() {
        Some((first, rest)) => rest.iter().fold(first.clone(), |acc, v| acc.min(v)),
        None => Dual::constant(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::FuzzyLogic;

    #[test]
    fn test_and_is_exact_min() {
        for (a, b) in [(0.2, 0.7), (0.9, 0.1), (0.5, 0.5)] {
            assert_eq!(and(&Dual::constant(a), &Dual::constant(b)).value(), a.min(b));
        }
    }

    #[test]
    fn test_exists_is_max() {
        let logic = FuzzyLogic::Minimum;
        let x = [Dual::constant(0.25), Dual::constant(0.75), Dual::constant(0.5)];
        assert!((logic.exists(&x).value() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_forall_gradient_is_sparse() {
        let x = [Dual::variable(0.4, 0, 2), Dual::variable(0.9, 1, 2)];
        assert_eq!(forall(&x).grad(), &[1.0, 0.0]);
    }
}
