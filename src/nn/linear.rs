use tch::{no_grad, Device, Kind, Tensor};

use crate::core::{Cellable, TensorCell};

use super::{Module, StateDict, Trainable};

/// A simple fully-connected layer.
#[derive(Debug)]
pub struct Linear {
    pub weight: TensorCell,
    pub bias: Option<TensorCell>,
}

impl Trainable for Linear {
    fn parameters(&self) -> StateDict {
        let mut result = StateDict::new();
        result.insert("weight".to_owned(), self.weight.clone());
        if let Some(bias) = &self.bias {
            result.insert("bias".to_owned(), bias.clone());
        }
        result
    }
}

impl Module for Linear {
    fn forward(&self, input: &Tensor) -> Tensor {
        let weight = self.weight.lock();
        if let Some(bias) = &self.bias {
            input.matmul(&weight.tr()) + &*bias.lock()
        } else {
            input.matmul(&weight.tr())
        }
    }
}

impl Linear {
    pub fn new(input_dim: i64, output_dim: i64, bias: bool) -> Linear {
        let mut weight = Tensor::empty(&[output_dim, input_dim], (Kind::Float, Device::Cpu))
            .set_requires_grad(true);
        let mut bias_tensor =
            Tensor::empty(&[output_dim], (Kind::Float, Device::Cpu)).set_requires_grad(true);
        no_grad(|| {
            weight.init(tch::nn::Init::KaimingUniform);
            bias_tensor.init(tch::nn::Init::Const(0.));
        });
        Linear {
            weight: weight.cell(),
            bias: if bias { Some(bias_tensor.cell()) } else { None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_shapes_and_parameters() {
        let layer = Linear::new(3, 2, true);
        let output = layer.forward(&Tensor::ones(&[4, 3], (Kind::Float, Device::Cpu)));
        assert_eq!(output.size(), vec![4, 2]);
        assert_eq!(layer.parameter_size(), 2);
        assert_eq!(Linear::new(3, 2, false).parameter_size(), 1);
    }
}
