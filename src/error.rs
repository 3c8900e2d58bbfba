//! Crate-wide error type.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    #[error("tensor creation error: shape {0:?} does not match data len {1}")]
    Create(Vec<usize>, usize),
    #[error("tensor shape error in {op}: {lhs:?} is not compatible with {rhs:?}")]
    Shape {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },
    #[error("backward error: tensor does not require grad and has no grad_fn")]
    NoGraph,
    #[error("backward error: grad can only be implicitly created for a single-element output, got shape {0:?}")]
    NonScalar(Vec<usize>),
}

impl TensorError {
    pub(crate) fn shape(op: &'static str, lhs: &[usize], rhs: &[usize]) -> Self {
        Self::Shape {
            op,
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        }
    }
}
