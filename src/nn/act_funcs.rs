use tch::Tensor;

use super::{Module, Trainable};

/// ReLU activation function.
#[derive(Debug)]
pub struct ReLU;

/// Leaky ReLU activation function.
#[derive(Debug)]
pub struct LeakyReLU {
    pub lambda: f64,
}

#[derive(Debug)]
pub struct Tanh;

/// Squashes discriminator logits into probabilities, for the BCE objective.
#[derive(Debug)]
pub struct Sigmoid;

impl LeakyReLU {
    pub fn new(lambda: f64) -> LeakyReLU {
        LeakyReLU { lambda }
    }
}

impl Trainable for ReLU {}
impl Trainable for LeakyReLU {}
impl Trainable for Tanh {}
impl Trainable for Sigmoid {}

impl Module for ReLU {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.relu()
    }
}

impl Module for LeakyReLU {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.maximum(&(input * self.lambda))
    }
}

impl Module for Tanh {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.tanh()
    }
}

impl Module for Sigmoid {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.sigmoid()
    }
}
