//! Core tensor data structures.
//!
//! # Core Tensor Utilities
//!
//! This module defines the dense storage every other module computes on.
//!
//! It supports:
//! - Construction of N-dimensional tensors with shape and row-major data layout
//! - Filled and randomly sampled constructors (`zeros`, `ones`, `randn`, `uniform_with`)
//! - `WithGrad` pairs of a value and its accumulated gradient
//! - Compile-time tensor literals through the `tensor!` macro
//!
//! ## Design Highlights
//! - Tensors are strongly typed: `Tensor<T>` for any element type (usually `f64`)
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - Tensors carry no autograd state; tracking lives in [`crate::backprop::Variable`]
//!
//! ## Example
//!
//! ```rust
//! use gradmode::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

use core::fmt;

use briny::prelude::{TrustedData, Validate, ValidationError};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::{TensorError, TensorFloat};

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// Tensor of the crate float type.
pub type Ten64 = Tensor<TensorFloat>;

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Creates a new tensor, validating that `data` fills `shape` exactly.
    ///
    /// # Errors
    /// Returns [`TensorError::Create`] when the element count does not match.
    pub fn try_new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self, TensorError> {
        let shape = shape.into();
        let len = data.len();
        let err = TensorError::Create(shape.clone(), len);
        TrustedData::new(Self { shape, data })
            .map(|trusted| trusted.into_inner())
            .map_err(|_| err)
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Replaces this tensor's data with another tensor of the same shape.
    ///
    /// # Panics
    /// Panics if shapes do not match.
    pub fn update(&mut self, mut other: Tensor<T>) {
        assert_eq!(self.shape, other.shape, "shape mismatch");
        core::mem::swap(&mut self.data, &mut other.data);
    }
}

impl<T> Validate for Tensor<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.shape.iter().product::<usize>() != self.data.len() {
            return Err(ValidationError);
        }
        Ok(())
    }
}

impl<T: Clone> Tensor<T> {
    /// Creates a tensor with every element set to `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: T) -> Self {
        let shape = shape.into();
        let n = shape.iter().product();
        Self {
            shape,
            data: vec![value; n],
        }
    }
}

impl Ten64 {
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, 1.0)
    }

    /// Samples i.i.d. standard-normal values using the thread-local RNG.
    ///
    /// # Example
    /// ```
    /// use gradmode::tensors::Tensor;
    /// let x = Tensor::randn(vec![1, 10]);
    /// assert_eq!(x.shape, vec![1, 10]);
    /// ```
    pub fn randn(shape: impl Into<Vec<usize>>) -> Self {
        Self::randn_with(shape, &mut rand::rng())
    }

    /// Samples i.i.d. standard-normal values from `rng`.
    pub fn randn_with<R: Rng + ?Sized>(shape: impl Into<Vec<usize>>, rng: &mut R) -> Self {
        let shape = shape.into();
        let n = shape.iter().product();
        let data = (0..n).map(|_| rng.sample::<f64, _>(StandardNormal)).collect();
        Self { shape, data }
    }

    /// Samples i.i.d. values from `U(lo, hi)`.
    pub fn uniform_with<R: Rng + ?Sized>(
        shape: impl Into<Vec<usize>>,
        lo: f64,
        hi: f64,
        rng: &mut R,
    ) -> Self {
        let shape = shape.into();
        let n = shape.iter().product();
        let data = (0..n)
            .map(|_| lo + (hi - lo) * rng.random::<f64>())
            .collect();
        Self { shape, data }
    }
}

impl<T: fmt::Display> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_dim<T: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            shape: &[usize],
            data: &[T],
        ) -> fmt::Result {
            let Some((&len, rest)) = shape.split_first() else {
                return write!(f, "{:.4}", data[0]);
            };
            let stride: usize = rest.iter().product();
            f.write_str("[")?;
            for i in 0..len {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_dim(f, rest, &data[i * stride..(i + 1) * stride])?;
            }
            f.write_str("]")
        }

        if self.data.is_empty() {
            return f.write_str("[]");
        }
        write_dim(f, &self.shape, &self.data)
    }
}

/// A container for tracking gradients of values (used in autograd).
///
/// Typically used as `WithGrad<Ten64>`.
#[derive(Debug, Clone, PartialEq)]
pub struct WithGrad<T> {
    pub value: T,
    pub grad: T,
}

impl WithGrad<Ten64> {
    /// Wraps `value` with a zeroed gradient of the same shape.
    pub fn new(value: Ten64) -> Self {
        let grad = Tensor::zeros(value.shape.clone());
        Self { value, grad }
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use gradmode::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $lit:literal ),+ $(,)? ]) => {{
        let data = vec![ $( $lit ),+ ];
        $crate::tensors::Tensor::new(vec![data.len()], data)
    }};

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn try_new_rejects_bad_len() {
        let err = Tensor::try_new(vec![2, 2], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, TensorError::Create(vec![2, 2], 3));
    }

    #[test]
    fn randn_is_seedable() {
        let a = Tensor::randn_with(vec![3, 4], &mut StdRng::seed_from_u64(7));
        let b = Tensor::randn_with(vec![3, 4], &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.numel(), 12);
    }

    #[test]
    fn uniform_stays_in_bounds() {
        let t = Tensor::uniform_with(vec![256], -0.5, 0.5, &mut StdRng::seed_from_u64(1));
        assert!(t.data.iter().all(|&v| (-0.5..0.5).contains(&v)));
    }

    #[test]
    fn update_swaps_in_same_shape() {
        let mut t = Tensor::zeros(vec![2]);
        t.update(tensor!([1.0, 2.0]));
        assert_eq!(t.data, vec![1.0, 2.0]);
        assert_eq!(t.ndim(), 1);
    }

    #[test]
    fn display_nests_brackets() {
        assert_eq!(tensor!([[10.0]]).to_string(), "[[10.0000]]");
        assert_eq!(tensor!([1.0, 2.5]).to_string(), "[1.0000, 2.5000]");
        assert_eq!(tensor!(3.0).to_string(), "3.0000");
    }

    #[test]
    fn macro_accepts_negative_entries() {
        let t = tensor!([[0.5, -1.0], [-2.0, 3.0]]);
        assert_eq!(t.shape, vec![2, 2]);
        assert_eq!(t.data, vec![0.5, -1.0, -2.0, 3.0]);
        assert_eq!(tensor!(-4.0).data, vec![-4.0]);
    }
}
