use serde::{Deserialize, Serialize};
use tch::Tensor;

/// Per-channel normalization of `(batch, channels, height, width)` images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalize {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Normalize {
    pub fn new(mean: Vec<f64>, std: Vec<f64>) -> Self {
        Self { mean, std }
    }

    /// Maps images in [0, 1] to [-1, 1], which is what tanh generators produce.
    pub fn symmetric(channels: usize) -> Self {
        Self::new(vec![0.5; channels], vec![0.5; channels])
    }

    fn stats(&self, like: &Tensor) -> (Tensor, Tensor) {
        let shape = [1, self.mean.len() as i64, 1, 1];
        let mean = Tensor::of_slice(&self.mean)
            .to_kind(like.kind())
            .to_device(like.device())
            .reshape(&shape);
        let std = Tensor::of_slice(&self.std)
            .to_kind(like.kind())
            .to_device(like.device())
            .reshape(&shape);
        (mean, std)
    }

    pub fn encode(&self, x: &Tensor) -> Tensor {
        let (mean, std) = self.stats(x);
        (x - mean) / std
    }

    /// The inverse of [Normalize::encode].
    pub fn decode(&self, x: &Tensor) -> Tensor {
        let (mean, std) = self.stats(x);
        x * std + mean
    }
}

#[cfg(test)]
mod tests {
    use tch::{Device, Kind};

    use crate::assert_tensor_eq;

    use super::*;

    #[test]
    fn decode_inverts_encode() {
        let normalize = Normalize::new(vec![0.2, 0.4, 0.6], vec![0.5, 0.25, 2.0]);
        let x = Tensor::rand(&[2, 3, 4, 4], (Kind::Float, Device::Cpu));
        assert_tensor_eq!(&normalize.decode(&normalize.encode(&x)), &x);
    }

    #[test]
    fn symmetric_maps_unit_range() {
        let normalize = Normalize::symmetric(1);
        let x = Tensor::of_slice(&[0.0f32, 0.5, 1.0]).reshape(&[1, 1, 1, 3]);
        let expected = Tensor::of_slice(&[-1.0f32, 0.0, 1.0]).reshape(&[1, 1, 1, 3]);
        assert_tensor_eq!(&normalize.encode(&x), &expected);
    }
}
