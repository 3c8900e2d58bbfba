//! Runs one linear layer with and without gradient tracking and prints the
//! outputs together with their `requires_grad` flags.

use std::error::Error;

use gradmode::{
    backprop::Variable,
    grad,
    nn::{Layer, Linear},
    tensors::Tensor,
};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let model = Linear::new(10, 1);
    let x = Variable::new(Tensor::randn(vec![1, 10]));

    let output = model.forward(&x)?;
    println!("Output (with gradient tracking): {output}");
    println!("Requires Grad: {}", output.requires_grad());

    grad::no_grad(|| -> Result<(), Box<dyn Error>> {
        let output_no_grad = model.forward(&x)?;
        println!("Output (no gradient tracking): {output_no_grad}");
        println!("Requires Grad: {}", output_no_grad.requires_grad());
        Ok(())
    })?;

    log::info!("gradient mode restored: {}", grad::is_grad_enabled());
    Ok(())
}
