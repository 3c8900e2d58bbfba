//! Neural network layers built on [`crate::backprop`].
//!
//! Layers own their parameters as [`Variable`]s that require grad, so any
//! output they produce is tracked unless it is computed inside a
//! [`crate::grad::no_grad`] scope.

use crate::{TensorError, backprop::Variable};

mod linear;
pub use linear::*;

/// A differentiable layer.
pub trait Layer {
    /// Applies the layer to `input`.
    ///
    /// # Errors
    /// Returns [`TensorError::Shape`] when `input` does not fit the layer.
    fn forward(&self, input: &Variable) -> Result<Variable, TensorError>;

    /// Handles to every trainable parameter, in a stable order.
    fn parameters(&self) -> Vec<Variable>;

    /// Zeros the gradients of every parameter.
    fn zero_grad(&self) {
        for param in self.parameters() {
            param.zero_grad();
        }
    }
}
