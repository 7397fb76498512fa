//! Differentiable values
//!
//! Forward-mode automatic differentiation over shaped tensors.

pub mod array;
pub mod dual;
pub mod tensor;

pub use array::Array;
pub use dual::{sigmoid, Dual};
pub use tensor::{broadcast_shapes, numel, Tensor};

pub mod prelude {
    pub use super::array::Array;
    pub use super::dual::Dual;
    pub use super::tensor::Tensor;
}
