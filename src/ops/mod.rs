//! # Numerical Kernels
//!
//! Pure tensor kernels with no autograd bookkeeping. The differentiable
//! wrappers in [`crate::backprop`] call into these for both the forward pass
//! and, when tracking is active, the backward pass.
//!
//! ## Submodules
//!
//! - [`cpu`] — Multi-threaded (+ optional SIMD) CPU kernels
//!
//! ## Notes
//!
//! - Kernels validate shapes and report mismatches as [`crate::TensorError::Shape`]
//! - SIMD acceleration is only used when the `simd` feature is enabled
//!
//! ## Feature Flags
//!
//! - `simd` — Enables AVX2-accelerated dot products

pub mod cpu;

pub use cpu::{add, add_row, matmul, matmul_nt, matmul_tn, sgd, sum_rows};
