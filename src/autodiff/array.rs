//! Plain shaped arrays
//!
//! Gradient-free counterpart of [`Tensor`](super::Tensor), used for plans,
//! projected plans and reported trajectories.

use serde::{Deserialize, Serialize};

use super::tensor::numel;

/// Row-major `f64` array with a shape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Array {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl Array {
    /// Build from a shape and values; `None` if the counts disagree
    pub fn from_parts(shape: Vec<usize>, values: Vec<f64>) -> Option<Self> {
        (numel(&shape) == values.len()).then_some(Self { shape, values })
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            values: vec![value],
        }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, 0.0)
    }

    pub fn filled(shape: &[usize], value: f64) -> Self {
        Self {
            shape: shape.to_vec(),
            values: vec![value; numel(shape)],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stack equally shaped arrays along a new leading axis
    pub fn stack(arrays: &[Array]) -> Option<Self> {
        let first = arrays.first()?;
        if arrays.iter().any(|a| a.shape != first.shape) {
            return None;
        }
        let mut shape = Vec::with_capacity(first.shape.len() + 1);
        shape.push(arrays.len());
        shape.extend_from_slice(&first.shape);
        let values = arrays.iter().flat_map(|a| a.values.iter().copied()).collect();
        Some(Self { shape, values })
    }

    /// Apply `f` to every element
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            shape: self.shape.clone(),
            values: self.values.iter().map(|v| f(*v)).collect(),
        }
    }
}
