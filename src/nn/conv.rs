use cyclegan_derive::PartialBuilder;
use tch::{no_grad, Device, Kind, Tensor};

use crate::core::{Cellable, TensorCell};

use super::{Module, StateDict, Trainable};

/// A 2D convolution over `(batch_size, channels, height, width)` inputs.
#[derive(Debug, PartialBuilder)]
pub struct Conv2d {
    pub conv_weight: TensorCell,
    pub conv_bias: Option<TensorCell>,

    #[builder(default = "[1, 1]")]
    pub kernel_size: [i64; 2],
    #[builder(default = "1")]
    pub in_channel: i64,
    #[builder(default = "1")]
    pub out_channel: i64,
    #[builder(default = "[1, 1]")]
    pub stride: [i64; 2],
    #[builder(default = "[0, 0]")]
    pub padding: [i64; 2],
    #[builder(default = "[1, 1]")]
    pub dilation: [i64; 2],
    #[builder(default = "1")]
    pub groups: i64,
    #[builder(default = "true")]
    pub bias: bool,
}

impl Trainable for Conv2d {
    fn parameters(&self) -> StateDict {
        let mut result = StateDict::new();
        result.insert("weight".to_owned(), self.conv_weight.clone());
        if let Some(bias) = &self.conv_bias {
            result.insert("bias".to_owned(), bias.clone());
        }
        result
    }
}

impl Module for Conv2d {
    fn forward(&self, input: &Tensor) -> Tensor {
        let weight = self.conv_weight.lock();
        let bias = self.conv_bias.as_ref().map(|bias| bias.lock());
        input.conv2d(
            &*weight,
            bias.as_deref(),
            &self.stride,
            &self.padding,
            &self.dilation,
            self.groups,
        )
    }
}

impl Conv2d {
    pub fn new(config: Conv2dConfig) -> Conv2d {
        let size: [i64; 4] = [
            config.out_channel,
            config.in_channel / config.groups,
            config.kernel_size[0],
            config.kernel_size[1],
        ];
        let mut conv_weight =
            Tensor::empty(&size, (Kind::Float, Device::Cpu)).set_requires_grad(true);
        let mut conv_bias = Tensor::empty(&[config.out_channel], (Kind::Float, Device::Cpu))
            .set_requires_grad(true);
        no_grad(|| {
            conv_weight.init(tch::nn::Init::KaimingUniform);
            conv_bias.init(tch::nn::Init::Const(0.));
        });
        Conv2d {
            conv_weight: conv_weight.cell(),
            conv_bias: if config.bias {
                Some(conv_bias.cell())
            } else {
                None
            },
            kernel_size: config.kernel_size,
            in_channel: config.in_channel,
            out_channel: config.out_channel,
            stride: config.stride,
            padding: config.padding,
            dilation: config.dilation,
            groups: config.groups,
            bias: config.bias,
        }
    }
}

/// A `kernel_size` x `kernel_size` convolution with "same" padding and unit stride.
pub fn conv2d(in_channel: i64, out_channel: i64, kernel_size: i64) -> Conv2d {
    Conv2dBuilder::default()
        .in_channel(in_channel)
        .out_channel(out_channel)
        .kernel_size([kernel_size, kernel_size])
        .padding([kernel_size / 2, kernel_size / 2])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_padding_keeps_spatial_size() {
        let conv = conv2d(3, 8, 3);
        let output = conv.forward(&Tensor::ones(&[2, 3, 5, 5], (Kind::Float, Device::Cpu)));
        assert_eq!(output.size(), vec![2, 8, 5, 5]);
    }

    #[test]
    fn builder_defaults() {
        let conv = Conv2dBuilder::default().in_channel(2).build();
        assert_eq!(conv.out_channel, 1);
        assert_eq!(conv.stride, [1, 1]);
        assert!(conv.conv_bias.is_some());
        assert_eq!(conv.conv_weight.lock().size(), vec![1, 2, 1, 1]);
    }
}
