use gradmode::backprop::{self, Variable};
use gradmode::grad::{NoGradGuard, enable_grad, is_grad_enabled, no_grad, set_grad_enabled};
use gradmode::nn::{Layer, Linear};
use gradmode::tensors::Tensor;
use gradmode::{TensorError, tensor};

fn ones_layer() -> Linear {
    Linear::from_parameters(Tensor::ones(vec![1, 10]), Some(tensor!([0.0]))).unwrap()
}

#[test]
fn test_linear_output_shape() {
    let model = Linear::new(10, 1);
    let x = Variable::new(Tensor::randn(vec![1, 10]));
    let out = model.forward(&x).unwrap();
    assert_eq!(out.shape(), vec![1, 1]);
}

#[test]
fn test_tracked_outside_no_grad() {
    let model = Linear::new(10, 1);
    let x = Variable::new(Tensor::randn(vec![1, 10]));
    let out = model.forward(&x).unwrap();
    assert!(out.requires_grad());
    assert_eq!(out.grad_fn_name(), Some("LinearBackward"));
}

#[test]
fn test_untracked_inside_no_grad() {
    let model = Linear::new(10, 1);
    let x = Variable::new(Tensor::randn(vec![1, 10]));
    let tracked = model.forward(&x).unwrap();
    let untracked = no_grad(|| model.forward(&x)).unwrap();
    assert!(!untracked.requires_grad());
    assert_eq!(tracked.value(), untracked.value());
}

#[test]
fn test_no_grad_ignores_input_flags() {
    let a = Variable::parameter(tensor!([[1.0, 2.0]]));
    let b = Variable::parameter(tensor!([[3.0, 4.0]]));
    let c = no_grad(|| backprop::add(&a, &b)).unwrap();
    assert!(!c.requires_grad());
    assert_eq!(c.backward(), Err(TensorError::NoGraph));
}

#[test]
fn test_mode_restored_after_scope() {
    let model = ones_layer();
    let x = Variable::new(Tensor::ones(vec![1, 10]));
    {
        let _guard = NoGradGuard::new();
        assert!(!model.forward(&x).unwrap().requires_grad());
    }
    assert!(is_grad_enabled());
    assert!(model.forward(&x).unwrap().requires_grad());
}

#[test]
fn test_flag_fixed_at_compute_time() {
    let model = ones_layer();
    let x = Variable::new(Tensor::ones(vec![1, 10]));
    let guard = set_grad_enabled(false);
    let out = model.forward(&x).unwrap();
    drop(guard);
    assert!(is_grad_enabled());
    assert!(!out.requires_grad());
}

#[test]
fn test_enable_grad_inside_no_grad() {
    let model = ones_layer();
    let x = Variable::new(Tensor::ones(vec![1, 10]));
    let out = no_grad(|| enable_grad(|| model.forward(&x))).unwrap();
    assert!(out.requires_grad());
    assert!(is_grad_enabled());
}

#[test]
fn test_fixed_parameter_scenario() {
    let model = ones_layer();
    let x = Variable::new(Tensor::ones(vec![1, 10]));

    let output = model.forward(&x).unwrap();
    assert_eq!(output.value(), tensor!([[10.0]]));
    assert!(output.requires_grad());

    let output_no_grad = no_grad(|| model.forward(&x)).unwrap();
    assert_eq!(output_no_grad.value(), tensor!([[10.0]]));
    assert!(!output_no_grad.requires_grad());
}

#[test]
fn test_backward_through_tracked_output_only() {
    let model = ones_layer();
    let x = Variable::new(Tensor::ones(vec![1, 10]));

    let untracked = no_grad(|| model.forward(&x)).unwrap();
    assert!(untracked.backward().is_err());

    model.forward(&x).unwrap().backward().unwrap();
    assert_eq!(model.weight().grad().unwrap(), Tensor::ones(vec![1, 10]));
    assert_eq!(model.bias().unwrap().grad().unwrap(), tensor!([1.0]));

    backprop::sgd(&model.parameters(), 0.1).unwrap();
    let stepped = no_grad(|| model.forward(&x)).unwrap();
    assert!(gradmode::approx::approx_eq(&stepped.value(), &tensor!([[8.9]])));
}
