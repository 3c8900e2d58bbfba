//! Differentiable operations and autograd utilities.
//!
//! # Tracked Variables
//!
//! A [`Variable`] is a shared handle to a [`WithGrad`] slot plus two pieces of
//! autograd metadata fixed at creation time:
//!
//! - `requires_grad`: whether gradients flow into or through this variable
//! - an optional backward node linking it to the variables it was computed from
//!
//! ## Recording Rule
//!
//! Every op in this module records a backward node **iff** gradient mode is
//! enabled on the current thread ([`crate::grad::is_grad_enabled`]) **and** at
//! least one input requires grad. Otherwise the output is a plain constant and
//! no backward closure is built at all. Because the decision is taken when the
//! op runs, leaving a [`crate::grad::no_grad`] scope later never turns an
//! untracked output into a tracked one.
//!
//! ## Autograd Pattern
//!
//! 1. **Forward Pass** computes the output tensor through [`crate::ops`].
//! 2. **Backward Closure** captures the minimal cloned inputs needed and maps
//!    `dL/d(out)` to one gradient per input.
//! 3. [`Variable::backward`] walks the graph in reverse topological order and
//!    accumulates into the leaves that require grad.
//!
//! # Example
//!
//! ```rust
//! use gradmode::{backprop::{self, Variable}, tensor};
//!
//! let w = Variable::parameter(tensor!([[2.0, 3.0]]));
//! let x = Variable::new(tensor!([[1.0, 1.0]]));
//! let y = backprop::linear(&x, &w, None).unwrap();
//! backprop::sum(&y).backward().unwrap();
//! assert_eq!(w.grad().unwrap().data, vec![1.0, 1.0]);
//! ```

use core::{cell::RefCell, fmt};
use std::{collections::HashMap, rc::Rc};

use crate::{
    TensorError,
    grad::{is_grad_enabled, no_grad},
    ops,
    tensors::{Ten64, Tensor, WithGrad},
};

/// Maps `dL/d(out)` to `dL/d(input)` for every input of a node, in order.
pub type BackwardFn = Box<dyn Fn(&Ten64) -> Result<Vec<Ten64>, TensorError>>;

struct GradNode {
    name: &'static str,
    inputs: Vec<Variable>,
    backward: BackwardFn,
}

struct VarInner {
    slot: RefCell<WithGrad<Ten64>>,
    requires_grad: bool,
    node: Option<GradNode>,
}

/// Shared handle to a tensor participating (or not) in the autograd graph.
///
/// Cloning a `Variable` clones the handle, not the data.
#[derive(Clone)]
pub struct Variable {
    inner: Rc<VarInner>,
}

impl Variable {
    fn build(value: Ten64, requires_grad: bool, node: Option<GradNode>) -> Self {
        Self {
            inner: Rc::new(VarInner {
                slot: RefCell::new(WithGrad::new(value)),
                requires_grad,
                node,
            }),
        }
    }

    /// Wraps `value` as a constant. It never requires grad.
    pub fn new(value: Ten64) -> Self {
        Self::build(value, false, None)
    }

    /// Wraps `value` as a trainable leaf that requires grad.
    pub fn parameter(value: Ten64) -> Self {
        Self::build(value, true, None)
    }

    /// Returns a copy of the current value.
    pub fn value(&self) -> Ten64 {
        self.inner.slot.borrow().value.clone()
    }

    /// Runs `f` against the value without cloning it.
    pub fn with_value<R>(&self, f: impl FnOnce(&Ten64) -> R) -> R {
        f(&self.inner.slot.borrow().value)
    }

    pub fn shape(&self) -> Vec<usize> {
        self.inner.slot.borrow().value.shape.clone()
    }

    /// The accumulated gradient, or `None` when this variable does not require grad.
    pub fn grad(&self) -> Option<Ten64> {
        self.inner
            .requires_grad
            .then(|| self.inner.slot.borrow().grad.clone())
    }

    /// Whether this variable takes part in gradient computation.
    ///
    /// Fixed when the variable is created; see the module docs.
    pub fn requires_grad(&self) -> bool {
        self.inner.requires_grad
    }

    /// True for variables created directly rather than by a recorded op.
    pub fn is_leaf(&self) -> bool {
        self.inner.node.is_none()
    }

    /// Name of the op that produced this variable, if it was recorded.
    pub fn grad_fn_name(&self) -> Option<&'static str> {
        self.inner.node.as_ref().map(|node| node.name)
    }

    /// Returns a constant sharing no state with `self`.
    pub fn detach(&self) -> Self {
        Self::new(self.value())
    }

    /// Resets the accumulated gradient to zeros.
    pub fn zero_grad(&self) {
        let mut slot = self.inner.slot.borrow_mut();
        slot.grad = Tensor::zeros(slot.value.shape.clone());
    }

    fn key(&self) -> *const VarInner {
        Rc::as_ptr(&self.inner)
    }

    /// Computes gradients of this single-element output with respect to every
    /// reachable leaf that requires grad, accumulating into their `grad`.
    ///
    /// Runs with gradient mode disabled.
    ///
    /// # Errors
    /// - [`TensorError::NoGraph`] if this variable does not require grad
    /// - [`TensorError::NonScalar`] if it holds more than one element
    pub fn backward(&self) -> Result<(), TensorError> {
        if !self.requires_grad() {
            return Err(TensorError::NoGraph);
        }
        let shape = self.shape();
        if shape.iter().product::<usize>() != 1 {
            return Err(TensorError::NonScalar(shape));
        }

        no_grad(|| -> Result<(), TensorError> {
            let order = self.topo_order();
            log::debug!("backward through {} variables", order.len());

            let mut pending: HashMap<*const VarInner, Ten64> = HashMap::new();
            pending.insert(self.key(), Tensor::ones(shape));

            for var in order.iter().rev() {
                let Some(grad_out) = pending.remove(&var.key()) else {
                    continue;
                };
                let Some(node) = &var.inner.node else {
                    let mut slot = var.inner.slot.borrow_mut();
                    let acc = ops::add(&slot.grad, &grad_out)?;
                    slot.grad = acc;
                    continue;
                };

                let grads = (node.backward)(&grad_out)?;
                for (input, grad_in) in node.inputs.iter().zip(grads) {
                    if !input.requires_grad() {
                        continue;
                    }
                    let acc = match pending.remove(&input.key()) {
                        Some(prev) => ops::add(&prev, &grad_in)?,
                        None => grad_in,
                    };
                    pending.insert(input.key(), acc);
                }
            }
            Ok(())
        })
    }

    /// Post-order DFS over variables that require grad, rooted at `self`.
    fn topo_order(&self) -> Vec<Variable> {
        let mut order = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![(self.clone(), false)];

        while let Some((var, expanded)) = stack.pop() {
            if expanded {
                order.push(var);
                continue;
            }
            if !seen.insert(var.key()) {
                continue;
            }
            stack.push((var.clone(), true));
            if let Some(node) = &var.inner.node {
                for input in node.inputs.iter().filter(|v| v.requires_grad()) {
                    if !seen.contains(&input.key()) {
                        stack.push((input.clone(), false));
                    }
                }
            }
        }
        order
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("value", &self.inner.slot.borrow().value)
            .field("requires_grad", &self.inner.requires_grad)
            .field("grad_fn", &self.grad_fn_name())
            .finish()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor({}", self.inner.slot.borrow().value)?;
        match self.grad_fn_name() {
            Some(name) => write!(f, ", grad_fn=<{name}>)"),
            None if self.requires_grad() => f.write_str(", requires_grad=true)"),
            None => f.write_str(")"),
        }
    }
}

/// Builds the output variable, attaching a backward node only when tracking.
///
/// `backward` is only invoked when a node is actually recorded.
fn record(
    value: Ten64,
    name: &'static str,
    inputs: &[&Variable],
    backward: impl FnOnce() -> BackwardFn,
) -> Variable {
    if is_grad_enabled() && inputs.iter().any(|v| v.requires_grad()) {
        let node = GradNode {
            name,
            inputs: inputs.iter().map(|&v| v.clone()).collect(),
            backward: backward(),
        };
        Variable::build(value, true, Some(node))
    } else {
        Variable::new(value)
    }
}

/// Reduces a broadcast gradient `[m, n]` back to a row shaped like `target`.
fn reduce_to_row(grad: &Ten64, target: &[usize]) -> Result<Ten64, TensorError> {
    let summed = ops::sum_rows(grad)?;
    Ok(Tensor::new(target.to_vec(), summed.data))
}

/// Matrix product of two 2-D variables: `a` (m×k) · `b` (k×n).
///
/// # Errors
/// Returns [`TensorError::Shape`] if the operands are not 2-D or inner dims differ.
pub fn matmul(a: &Variable, b: &Variable) -> Result<Variable, TensorError> {
    let (a_val, b_val) = (a.value(), b.value());
    let out = ops::matmul(&a_val, &b_val)?;

    Ok(record(out, "MatmulBackward", &[a, b], move || -> BackwardFn {
        Box::new(move |grad: &Ten64| -> Result<Vec<Ten64>, TensorError> {
            // dA = G·Bᵀ, dB = Aᵀ·G
            Ok(vec![
                ops::matmul_nt(grad, &b_val)?,
                ops::matmul_tn(&a_val, grad)?,
            ])
        })
    }))
}

/// Elementwise sum. `b` may also be a single row (`[n]` or `[1, n]`) that is
/// broadcast over every row of a 2-D `a`.
pub fn add(a: &Variable, b: &Variable) -> Result<Variable, TensorError> {
    let (a_val, b_val) = (a.value(), b.value());
    let broadcast = a_val.shape != b_val.shape;
    let out = if broadcast {
        ops::add_row(&a_val, &b_val)?
    } else {
        ops::add(&a_val, &b_val)?
    };

    let b_shape = b_val.shape;
    Ok(record(out, "AddBackward", &[a, b], move || -> BackwardFn {
        Box::new(move |grad: &Ten64| -> Result<Vec<Ten64>, TensorError> {
            let grad_b = if broadcast {
                reduce_to_row(grad, &b_shape)?
            } else {
                grad.clone()
            };
            Ok(vec![grad.clone(), grad_b])
        })
    }))
}

/// Affine map `x·wᵀ + b` with `x: [batch, in]`, `w: [out, in]`, `b: [out]`.
///
/// # Errors
/// Returns [`TensorError::Shape`] if `x`'s width differs from `w`'s, or `b`
/// does not hold `out` elements.
pub fn linear(x: &Variable, w: &Variable, b: Option<&Variable>) -> Result<Variable, TensorError> {
    let (x_val, w_val) = (x.value(), w.value());
    let mut out = ops::matmul_nt(&x_val, &w_val)?;
    let b_shape = match b {
        Some(b) => {
            let b_val = b.value();
            out = ops::add_row(&out, &b_val)?;
            Some(b_val.shape)
        }
        None => None,
    };

    let mut inputs = vec![x, w];
    inputs.extend(b);
    Ok(record(out, "LinearBackward", &inputs, move || -> BackwardFn {
        Box::new(move |grad: &Ten64| -> Result<Vec<Ten64>, TensorError> {
            // dX = G·W, dW = Gᵀ·X, db = Σ_rows G
            let mut grads = vec![ops::matmul(grad, &w_val)?, ops::matmul_tn(grad, &x_val)?];
            if let Some(shape) = &b_shape {
                grads.push(reduce_to_row(grad, shape)?);
            }
            Ok(grads)
        })
    }))
}

/// Sums every element into a single-element (0-d) variable.
pub fn sum(a: &Variable) -> Variable {
    let shape = a.shape();
    let total = a.with_value(|t| t.data.iter().sum::<f64>());

    let out = Tensor::new(Vec::<usize>::new(), vec![total]);
    record(out, "SumBackward", &[a], move || -> BackwardFn {
        Box::new(move |grad: &Ten64| -> Result<Vec<Ten64>, TensorError> {
            Ok(vec![Tensor::full(shape.clone(), grad.data[0])])
        })
    })
}

/// Performs an in-place Stochastic Gradient Descent (SGD) update on every
/// parameter, under [`no_grad`], then zeros their gradients.
///
/// Applies: `param = param - learning_rate * gradient`.
///
/// # Errors
/// Propagates [`TensorError::Shape`] from the update kernel.
pub fn sgd(params: &[Variable], lr: f64) -> Result<(), TensorError> {
    no_grad(|| -> Result<(), TensorError> {
        for param in params.iter().filter(|p| p.requires_grad()) {
            let mut slot = param.inner.slot.borrow_mut();
            let WithGrad { value, grad } = &mut *slot;
            ops::sgd(value, grad, lr)?;
            *grad = Tensor::zeros(value.shape.clone());
        }
        Ok(())
    })
}
