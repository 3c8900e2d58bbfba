use rand::Rng;

use super::Layer;
use crate::{
    TensorError,
    backprop::{self, Variable},
    tensors::{Ten64, Tensor},
};

/// Shape and options of a [`Linear`] layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearConfig {
    pub in_features: usize,
    pub out_features: usize,
    pub bias: bool,
}

impl LinearConfig {
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self {
            in_features,
            out_features,
            bias: true,
        }
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }
}

/// A fully connected layer: `y = x·Wᵀ + b`.
///
/// - `W` has shape `[out_features, in_features]`
/// - `b` has shape `[out_features]`
///
/// Both are created once and reused by every call to [`Layer::forward`].
#[derive(Debug, Clone)]
pub struct Linear {
    config: LinearConfig,
    weight: Variable,
    bias: Option<Variable>,
}

impl Linear {
    /// Creates a layer with bias, sampling parameters from the thread-local RNG.
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::from_config(LinearConfig::new(in_features, out_features))
    }

    pub fn from_config(config: LinearConfig) -> Self {
        Self::with_rng(config, &mut rand::rng())
    }

    /// Creates a layer sampling every parameter from `U(-1/√in, 1/√in)`.
    pub fn with_rng<R: Rng + ?Sized>(config: LinearConfig, rng: &mut R) -> Self {
        let LinearConfig {
            in_features,
            out_features,
            bias,
        } = config;
        let bound = if in_features > 0 {
            1.0 / (in_features as f64).sqrt()
        } else {
            0.0
        };

        let weight = Tensor::uniform_with(vec![out_features, in_features], -bound, bound, rng);
        let bias = bias.then(|| Tensor::uniform_with(vec![out_features], -bound, bound, rng));

        log::debug!("linear layer {in_features} -> {out_features} (bias: {})", config.bias);
        Self {
            config,
            weight: Variable::parameter(weight),
            bias: bias.map(Variable::parameter),
        }
    }

    /// Builds a layer from fixed parameters.
    ///
    /// # Errors
    /// Returns [`TensorError::Shape`] unless `weight` is `[out, in]` and `bias`
    /// holds exactly `out` elements.
    pub fn from_parameters(weight: Ten64, bias: Option<Ten64>) -> Result<Self, TensorError> {
        let &[out_features, in_features] = weight.shape.as_slice() else {
            return Err(TensorError::shape("linear", &weight.shape, &[]));
        };
        if let Some(b) = &bias
            && b.numel() != out_features
        {
            return Err(TensorError::shape("linear", &weight.shape, &b.shape));
        }

        let config = LinearConfig::new(in_features, out_features).with_bias(bias.is_some());
        log::debug!("linear layer {in_features} -> {out_features} from fixed parameters");
        Ok(Self {
            config,
            weight: Variable::parameter(weight),
            bias: bias.map(|b| Variable::parameter(Tensor::new(vec![out_features], b.data))),
        })
    }

    pub fn config(&self) -> LinearConfig {
        self.config
    }

    pub fn weight(&self) -> &Variable {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Variable> {
        self.bias.as_ref()
    }
}

impl Layer for Linear {
    /// Maps `[batch, in_features]` to `[batch, out_features]`.
    ///
    /// # Errors
    /// Returns [`TensorError::Shape`] when `input` is not 2-D or its width
    /// differs from `in_features`.
    fn forward(&self, input: &Variable) -> Result<Variable, TensorError> {
        backprop::linear(input, &self.weight, self.bias.as_ref())
    }

    fn parameters(&self) -> Vec<Variable> {
        let mut params = vec![self.weight.clone()];
        params.extend(self.bias.clone());
        params
    }
}
