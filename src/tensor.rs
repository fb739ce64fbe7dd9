//! Dense tensor values flowing through graph evaluation.

use ndarray::{ArrayD, IxDyn};

/// A dense tensor of `f32` values with dynamic dimensionality.
///
/// Equality is exact element-wise equality, which is what the fold
/// transparency contract requires: a folded module must be bit-identical
/// to the original for deterministic operations.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData(pub ArrayD<f32>);

impl TensorData {
    /// Creates a zero-dimensional tensor holding a single value.
    pub fn scalar(value: f32) -> Self {
        TensorData(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// Creates a tensor of the given shape from row-major data.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not match the product of `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Self {
        let array = ArrayD::from_shape_vec(IxDyn(shape), data)
            .expect("data length does not match shape");
        TensorData(array)
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn ndim(&self) -> usize {
        self.0.ndim()
    }
}

impl From<ArrayD<f32>> for TensorData {
    fn from(array: ArrayD<f32>) -> Self {
        TensorData(array)
    }
}
