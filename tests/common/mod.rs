#![allow(dead_code)]

use cyclegan::{
    dataset::{DataLoaders, Normalize, UnpairedDataset},
    learner::{cycle_learner, Learner},
    loss::CycleGanLossBuilder,
    nn::{conv2d, CycleGan, LeakyReLU, Tanh},
    optim::{adam_fn, AdamBuilder},
    seq,
};
use tch::{Device, Kind, Tensor};

pub const CHANNELS: i64 = 3;
pub const SIZE: i64 = 4;

/// A CycleGAN small enough to train on the CPU in a test.
pub fn tiny_model() -> CycleGan {
    tch::manual_seed(0);
    CycleGan::new(
        seq!(conv2d(CHANNELS, CHANNELS, 3), Tanh),
        seq!(conv2d(CHANNELS, CHANNELS, 3), Tanh),
        seq!(conv2d(CHANNELS, 2, 3), LeakyReLU::new(0.2), conv2d(2, 1, 1)),
        seq!(conv2d(CHANNELS, 2, 3), LeakyReLU::new(0.2), conv2d(2, 1, 1)),
    )
}

pub fn images(n: i64) -> Tensor {
    Tensor::rand(&[n, CHANNELS, SIZE, SIZE], (Kind::Float, Device::Cpu))
}

pub fn dls(n_train: i64, n_valid: Option<i64>, batch_size: usize) -> DataLoaders {
    tch::manual_seed(1);
    let train = UnpairedDataset::from_stacks(&images(n_train), &images(n_train + 1), batch_size);
    let valid = n_valid.map(|n| UnpairedDataset::from_stacks(&images(n), &images(n), batch_size));
    DataLoaders::new(train, valid).with_normalize(Normalize::symmetric(CHANNELS as usize))
}

pub fn learner(dls: DataLoaders) -> Learner {
    cycle_learner(
        dls,
        tiny_model(),
        CycleGanLossBuilder::default().build(),
        adam_fn(AdamBuilder::default().mom(0.5).sqr_mom(0.999)),
        Vec::new(),
        Vec::new(),
    )
    .with_lr(1e-3)
}
