//! gradmode: tiny autodiff tensors with a scoped gradient mode.
//!
//! Every differentiable operation decides at the moment it runs whether to
//! record a backward node. That decision is driven by a per-thread gradient
//! mode which can be suspended for a region of code with [`grad::no_grad`]
//! (or a [`grad::NoGradGuard`]) and is restored exactly when the region ends.
//!
//! # Modules
//!
//! - [`tensors`] — Dense row-major tensor storage and samplers.
//! - [`grad`] — The thread-local gradient mode and its scope guards.
//! - [`ops`] — Bookkeeping-free numerical kernels.
//! - [`backprop`] — Tracked variables, differentiable ops and reverse-mode backward.
//! - [`nn`] — The `Linear` layer.
//! - [`approx`] — Float comparison helpers.
//!
//! # Example
//!
//! ```rust
//! use gradmode::{backprop::Variable, grad, nn::{Layer, Linear}, tensors::Tensor};
//!
//! let layer = Linear::new(10, 1);
//! let x = Variable::new(Tensor::randn(vec![1, 10]));
//!
//! let y = layer.forward(&x).unwrap();
//! assert!(y.requires_grad());
//!
//! let y = grad::no_grad(|| layer.forward(&x)).unwrap();
//! assert!(!y.requires_grad());
//! ```

#![warn(clippy::all)]
#![allow(clippy::many_single_char_names, clippy::cast_precision_loss)]

pub mod approx;
pub mod backprop;
pub mod error;
pub mod grad;
pub mod nn;
pub mod ops;
pub mod tensors;

pub use error::TensorError;

/// The float used in tensors.
pub type TensorFloat = f64;
