//! Shaped tensors of dual numbers
//!
//! Tensors are stored row-major. Element-wise operations broadcast their
//! operands the way numpy does: shapes are aligned on the right and
//! dimensions of size one stretch to match.

use super::array::Array;
use super::dual::Dual;

/// Row-major tensor of [`Dual`] values
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<Dual>,
}

impl Tensor {
    /// Zero-dimensional tensor
    pub fn scalar(value: Dual) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// Zero-dimensional constant
    pub fn constant(value: f64) -> Self {
        Self::scalar(Dual::constant(value))
    }

    /// Tensor of `shape` with every element set to `value`
    pub fn filled(shape: &[usize], value: f64) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![Dual::constant(value); numel(shape)],
        }
    }

    /// Build from raw elements; `None` if the element count does not fit `shape`
    pub fn from_duals(shape: Vec<usize>, data: Vec<Dual>) -> Option<Self> {
        (numel(&shape) == data.len()).then_some(Self { shape, data })
    }

    /// Build a constant tensor from plain values
    pub fn from_array(array: &Array) -> Self {
        Self {
            shape: array.shape().to_vec(),
            data: array.values().iter().map(|v| Dual::constant(*v)).collect(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    pub fn data(&self) -> &[Dual] {
        &self.data
    }

    /// First element; the value of a scalar tensor
    pub fn item(&self) -> Dual {
        self.data.first().cloned().unwrap_or_default()
    }

    /// Forward values without gradients
    pub fn to_array(&self) -> Array {
        Array::from_parts(
            self.shape.clone(),
            self.data.iter().map(Dual::value).collect(),
        )
        .unwrap_or_else(|| Array::scalar(f64::NAN))
    }

    /// Apply `f` to every element
    pub fn map(&self, f: impl Fn(&Dual) -> Dual) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }

    /// True if any element satisfies `pred`
    pub fn any(&self, pred: impl Fn(f64) -> bool) -> bool {
        self.data.iter().any(|d| pred(d.value()))
    }

    /// Element-wise binary op with broadcasting; `None` on incompatible shapes
    pub fn zip_map(&self, other: &Self, f: impl Fn(&Dual, &Dual) -> Dual) -> Option<Self> {
        let shape = broadcast_shapes(&self.shape, &other.shape)?;
        let data = (0..numel(&shape))
            .map(|i| {
                let a = &self.data[source_index(i, &shape, &self.shape)];
                let b = &other.data[source_index(i, &shape, &other.shape)];
                f(a, b)
            })
            .collect();
        Some(Self { shape, data })
    }

    /// Element-wise ternary op with broadcasting
    pub fn zip3_map(
        &self,
        second: &Self,
        third: &Self,
        f: impl Fn(&Dual, &Dual, &Dual) -> Dual,
    ) -> Option<Self> {
        let shape = broadcast_shapes(&self.shape, &second.shape)?;
        let shape = broadcast_shapes(&shape, &third.shape)?;
        let data = (0..numel(&shape))
            .map(|i| {
                f(
                    &self.data[source_index(i, &shape, &self.shape)],
                    &second.data[source_index(i, &shape, &second.shape)],
                    &third.data[source_index(i, &shape, &third.shape)],
                )
            })
            .collect();
        Some(Self { shape, data })
    }

    /// Stretch to exactly `shape`; `None` if the shapes are incompatible
    pub fn broadcast_to(&self, shape: &[usize]) -> Option<Self> {
        if self.shape == shape {
            return Some(self.clone());
        }
        let out = self.zip_map(&Self::filled(shape, 0.0), |a, _| a.clone())?;
        (out.shape == shape).then_some(out)
    }

    /// Reduce over `axes` (all axes if empty) with `f` applied to each group
    pub fn reduce(&self, axes: &[usize], f: impl Fn(&[Dual]) -> Dual) -> Self {
        if axes.is_empty() || self.shape.is_empty() {
            return Self::scalar(f(self.data.as_slice()));
        }
        let out_shape: Vec<usize> = self
            .shape
            .iter()
            .enumerate()
            .filter(|(axis, _)| !axes.contains(axis))
            .map(|(_, dim)| *dim)
            .collect();
        let mut groups: Vec<Vec<Dual>> = vec![Vec::new(); numel(&out_shape)];
        let strides = strides(&out_shape);
        for (flat, value) in self.data.iter().enumerate() {
            let index = unravel(flat, &self.shape);
            let mut out = 0;
            let mut k = 0;
            for (axis, i) in index.iter().enumerate() {
                if !axes.contains(&axis) {
                    out += i * strides[k];
                    k += 1;
                }
            }
            groups[out].push(value.clone());
        }
        Self {
            shape: out_shape,
            data: groups.iter().map(|g| f(g.as_slice())).collect(),
        }
    }

    /// Slice `index` along the leading axis
    pub fn index_first(&self, index: usize) -> Option<Self> {
        let (&lead, rest) = self.shape.split_first()?;
        if index >= lead {
            return None;
        }
        let step = numel(rest);
        Some(Self {
            shape: rest.to_vec(),
            data: self.data[index * step..(index + 1) * step].to_vec(),
        })
    }
}

/// Number of elements of a shape
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Numpy-style broadcast of two shapes
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
    }
    Some(out)
}

fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for i in (0..shape.len()).rev() {
        index[i] = flat % shape[i];
        flat /= shape[i];
    }
    index
}

/// Flat index into a source of `src_shape` broadcast to `out_shape`
fn source_index(flat: usize, out_shape: &[usize], src_shape: &[usize]) -> usize {
    if src_shape.len() == out_shape.len() && src_shape == out_shape {
        return flat;
    }
    let index = unravel(flat, out_shape);
    let offset = out_shape.len() - src_shape.len();
    let src_strides = strides(src_shape);
    src_shape
        .iter()
        .enumerate()
        .map(|(k, dim)| if *dim == 1 { 0 } else { index[k + offset] * src_strides[k] })
        .sum()
}
