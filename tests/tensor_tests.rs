use gradmode::ops::{matmul, sgd};
use gradmode::tensors::{Tensor, WithGrad};
use gradmode::{TensorError, tensor};

#[test]
fn test_tensor_creation() {
    let t = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_tensor_shape_mismatch_panics() {
    let result = std::panic::catch_unwind(|| {
        Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0]);
    });
    assert!(result.is_err());
}

#[test]
fn test_try_new_reports_mismatch() {
    assert_eq!(
        Tensor::try_new(vec![3], vec![1.0]),
        Err(TensorError::Create(vec![3], 1))
    );
}

#[test]
fn test_tensor_macro() {
    let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_tensor_macro_negative_entries() {
    let t = tensor!([[0.5, -1.0], [-2.5, 3.0]]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![0.5, -1.0, -2.5, 3.0]);

    let row = tensor!([-1.0, -2.0, -3.0,]);
    assert_eq!(row.shape, vec![3]);
}

#[test]
fn test_with_grad_starts_zeroed() {
    let w = WithGrad::new(tensor!([[1.0, 2.0, 3.0]]));
    assert_eq!(w.grad, Tensor::zeros(vec![1, 3]));
}

#[test]
fn test_matmul_shapes() {
    let a = Tensor::ones(vec![2, 3]);
    let b = Tensor::ones(vec![3, 4]);
    let out = matmul(&a, &b).unwrap();
    assert_eq!(out.shape, vec![2, 4]);
    assert!(out.data.iter().all(|&v| v == 3.0));
}

#[test]
fn test_sgd_shape_mismatch() {
    let mut w = Tensor::ones(vec![2]);
    assert!(sgd(&mut w, &Tensor::ones(vec![3]), 0.1).is_err());
}
