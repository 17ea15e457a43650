//! Swish activation.

use burn::module::Module;
use burn::tensor::{activation, backend::Backend, Tensor};

/// Swish activation: `x * sigmoid(x)`.
///
/// Stateless and parameter-free; applied after every normalization step in
/// the stem and inside each cardinality branch.
#[derive(Module, Clone, Debug, Default)]
pub struct Swish {}

impl Swish {
    /// Create the activation unit
    pub fn new() -> Self {
        Self {}
    }

    /// Apply the activation elementwise
    pub fn forward<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        input.clone() * activation::sigmoid(input)
    }
}
