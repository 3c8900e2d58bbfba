//! Parallel CPU tensor kernels
//!
//! # CPU Backend
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon)
//! - Optional SIMD acceleration using AVX2 + FMA (enabled via `simd` feature flag)
//! - Pure Rust fallback path when SIMD is disabled or unavailable
//!
//! ## Implemented Ops
//!
//! - `matmul`, `matmul_nt`, `matmul_tn`: matrix products with and without a transposed operand
//! - `add`, `add_row`, `sum_rows`: elementwise and broadcast helpers
//! - `sgd`: In-place stochastic gradient descent step
//!
//! All matrix kernels expect 2-D row-major tensors.

#[cfg(all(
    feature = "simd",
    target_arch = "x86_64",
    target_feature = "avx2",
    target_feature = "fma"
))]
use core::arch::x86_64::{
    _mm256_fmadd_pd, _mm256_loadu_pd, _mm256_setzero_pd, _mm256_storeu_pd,
};

use rayon::prelude::*;

use crate::{
    TensorError,
    tensors::{Ten64, Tensor},
};

fn dims2(op: &'static str, a: &Ten64, b: &Ten64) -> Result<(usize, usize), TensorError> {
    match a.shape.as_slice() {
        &[r, c] => Ok((r, c)),
        _ => Err(TensorError::shape(op, &a.shape, &b.shape)),
    }
}

/// Dot product of two equal-length contiguous rows.
#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    #[cfg(all(
        feature = "simd",
        target_arch = "x86_64",
        target_feature = "avx2",
        target_feature = "fma"
    ))]
    {
        let k = a.len();
        let mut acc = unsafe { _mm256_setzero_pd() };
        let mut idx = 0;
        while idx + 4 <= k {
            unsafe {
                let a_chunk = _mm256_loadu_pd(a[idx..].as_ptr());
                let b_chunk = _mm256_loadu_pd(b[idx..].as_ptr());
                acc = _mm256_fmadd_pd(a_chunk, b_chunk, acc);
            }
            idx += 4;
        }

        let mut temp = [0.0; 4];
        unsafe { _mm256_storeu_pd(temp.as_mut_ptr(), acc) };
        let mut sum: f64 = temp.iter().sum();
        for l in idx..k {
            sum += a[l] * b[l];
        }
        sum
    }

    #[cfg(not(all(
        feature = "simd",
        target_arch = "x86_64",
        target_feature = "avx2",
        target_feature = "fma"
    )))]
    {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }
}

/// Computes `C = A × B` for `A: m×k`, `B: k×n`.
///
/// Rows of the output are filled in parallel.
///
/// # Errors
/// Returns [`TensorError::Shape`] unless both operands are 2-D with matching inner dims.
///
/// # Example
/// ```rust
/// use gradmode::{ops::matmul, tensor};
///
/// let c = matmul(&tensor!([[1.0, 2.0]]), &tensor!([[3.0], [4.0]])).unwrap();
/// assert_eq!(c.data, vec![11.0]);
/// ```
pub fn matmul(a: &Ten64, b: &Ten64) -> Result<Ten64, TensorError> {
    let (m, k) = dims2("matmul", a, b)?;
    let (k2, n) = dims2("matmul", b, a)?;
    if k != k2 {
        return Err(TensorError::shape("matmul", &a.shape, &b.shape));
    }

    let b_data = &b.data;
    let mut out_data = vec![0.0; m * n];
    if n > 0 {
        out_data
            .par_chunks_mut(n)
            .zip(a.data.par_chunks(k.max(1)))
            .for_each(|(row, a_row)| {
                for (j, out) in row.iter_mut().enumerate() {
                    let mut sum = 0.0;
                    for (l, &x) in a_row.iter().enumerate().take(k) {
                        sum += x * b_data[l * n + j];
                    }
                    *out = sum;
                }
            });
    }

    Ok(Tensor::new(vec![m, n], out_data))
}

/// Computes `C = A × Bᵀ` for `A: m×k`, `B: n×k`.
///
/// Both operands are walked along contiguous rows, so this is the layout
/// used by the linear layer's forward pass.
pub fn matmul_nt(a: &Ten64, b: &Ten64) -> Result<Ten64, TensorError> {
    let (m, k) = dims2("matmul_nt", a, b)?;
    let (n, k2) = dims2("matmul_nt", b, a)?;
    if k != k2 {
        return Err(TensorError::shape("matmul_nt", &a.shape, &b.shape));
    }

    let mut out_data = vec![0.0; m * n];
    if n > 0 && k > 0 {
        out_data
            .par_chunks_mut(n)
            .zip(a.data.par_chunks(k))
            .for_each(|(row, a_row)| {
                for (out, b_row) in row.iter_mut().zip(b.data.chunks(k)) {
                    *out = dot(a_row, b_row);
                }
            });
    }

    Ok(Tensor::new(vec![m, n], out_data))
}

/// Computes `C = Aᵀ × B` for `A: k×m`, `B: k×n`.
pub fn matmul_tn(a: &Ten64, b: &Ten64) -> Result<Ten64, TensorError> {
    let (k, m) = dims2("matmul_tn", a, b)?;
    let (k2, n) = dims2("matmul_tn", b, a)?;
    if k != k2 {
        return Err(TensorError::shape("matmul_tn", &a.shape, &b.shape));
    }

    let a_data = &a.data;
    let b_data = &b.data;
    let mut out_data = vec![0.0; m * n];
    if n > 0 {
        out_data
            .par_chunks_mut(n)
            .enumerate()
            .for_each(|(i, row)| {
                for l in 0..k {
                    let x = a_data[l * m + i];
                    for (out, &y) in row.iter_mut().zip(&b_data[l * n..(l + 1) * n]) {
                        *out += x * y;
                    }
                }
            });
    }

    Ok(Tensor::new(vec![m, n], out_data))
}

/// Elementwise `a + b` for tensors of identical shape.
pub fn add(a: &Ten64, b: &Ten64) -> Result<Ten64, TensorError> {
    if a.shape != b.shape {
        return Err(TensorError::shape("add", &a.shape, &b.shape));
    }
    let data = a
        .data
        .par_iter()
        .zip(&b.data)
        .map(|(x, y)| x + y)
        .collect();
    Ok(Tensor::new(a.shape.clone(), data))
}

/// Adds `row` (shape `[n]` or `[1, n]`) to every row of `a: m×n`.
pub fn add_row(a: &Ten64, row: &Ten64) -> Result<Ten64, TensorError> {
    let (_, n) = dims2("add_row", a, row)?;
    if row.numel() != n || row.ndim() > 2 || (row.ndim() == 2 && row.shape[0] != 1) {
        return Err(TensorError::shape("add_row", &a.shape, &row.shape));
    }

    let mut data = a.data.clone();
    if n > 0 {
        data.par_chunks_mut(n).for_each(|out| {
            for (y, b) in out.iter_mut().zip(&row.data) {
                *y += b;
            }
        });
    }
    Ok(Tensor::new(a.shape.clone(), data))
}

/// Sums the rows of `a: m×n`, returning shape `[n]`.
pub fn sum_rows(a: &Ten64) -> Result<Ten64, TensorError> {
    let (_, n) = dims2("sum_rows", a, a)?;
    let mut out = vec![0.0; n];
    if n > 0 {
        for row in a.data.chunks(n) {
            for (acc, x) in out.iter_mut().zip(row) {
                *acc += x;
            }
        }
    }
    Ok(Tensor::new(vec![n], out))
}

/// Performs one in-place stochastic gradient descent step on `w`.
///
/// # Formula
/// $$ w := w - \\text{lr} \\cdot g $$
///
/// # Errors
/// Returns [`TensorError::Shape`] if `w` and `grad` differ in shape.
pub fn sgd(w: &mut Ten64, grad: &Ten64, lr: f64) -> Result<(), TensorError> {
    if w.shape != grad.shape {
        return Err(TensorError::shape("sgd", &w.shape, &grad.shape));
    }
    w.data
        .par_iter_mut()
        .zip(&grad.data)
        .for_each(|(param, g)| *param -= lr * g);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{approx::approx_eq, tensor};

    #[test]
    fn matmul_matches_hand_computed() {
        let a = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let b = tensor!([[7.0, 8.0], [9.0, 10.0], [11.0, 12.0]]);
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.shape, vec![2, 2]);
        assert_eq!(c.data, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn transposed_variants_agree_with_matmul() {
        let a = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let bt = tensor!([[7.0, 9.0, 11.0], [8.0, 10.0, 12.0]]);
        assert_eq!(matmul_nt(&a, &bt).unwrap().data, vec![58.0, 64.0, 139.0, 154.0]);

        let at = tensor!([[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]]);
        let b = tensor!([[7.0, 8.0], [9.0, 10.0], [11.0, 12.0]]);
        assert_eq!(matmul_tn(&at, &b).unwrap().data, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn matmul_nt_covers_lanes_and_tail() {
        let a = Tensor::new(vec![1, 10], (1..=10).map(f64::from).collect());
        let out = matmul_nt(&a, &Tensor::ones(vec![2, 10])).unwrap();
        assert_eq!(out.data, vec![55.0, 55.0]);
    }

    #[test]
    fn matmul_rejects_inner_mismatch() {
        let err = matmul(&Tensor::ones(vec![2, 3]), &Tensor::ones(vec![2, 3])).unwrap_err();
        assert!(matches!(err, TensorError::Shape { op: "matmul", .. }));
    }

    #[test]
    fn add_row_broadcasts_over_batch() {
        let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let out = add_row(&a, &tensor!([10.0, 20.0])).unwrap();
        assert_eq!(out.data, vec![11.0, 22.0, 13.0, 24.0]);
        assert!(add_row(&a, &tensor!([1.0, 2.0, 3.0])).is_err());
    }

    #[test]
    fn sum_rows_collapses_batch() {
        let out = sum_rows(&tensor!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
        assert_eq!(out.shape, vec![2]);
        assert_eq!(out.data, vec![4.0, 6.0]);
    }

    #[test]
    fn sgd_steps_against_gradient() {
        let mut w = tensor!([1.0, 2.0]);
        sgd(&mut w, &tensor!([0.1, 0.2]), 0.5).unwrap();
        assert!(approx_eq(w.data.as_slice(), [0.95, 1.9].as_slice()));
    }
}
