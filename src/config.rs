use std::{fs::File, io::BufReader, path::Path};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tch::Tensor;

use crate::{
    dataset::UnpairedDataset,
    learner::FlatLinConfig,
    loss::{CycleGanLoss, CycleGanLossBuilder},
    optim::{adam_fn, AdamBuilder, Curve, OptimizerFn},
};

/// Hyperparameters of a CycleGAN training run, as read from a JSON file.
///
/// Missing keys take the values below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub l_a: f64,
    pub l_b: f64,
    pub l_idt: f64,
    pub lsgan: bool,
    pub lr: f64,
    pub n_epochs: usize,
    pub n_epochs_decay: usize,
    pub end_lr: f64,
    pub curve_type: String,
    pub wd: Option<f64>,
    pub batch_size: usize,
    pub seed: Option<u64>,
    pub mom: f64,
    pub sqr_mom: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            l_a: 10.,
            l_b: 10.,
            l_idt: 0.5,
            lsgan: true,
            lr: 2e-4,
            n_epochs: 100,
            n_epochs_decay: 100,
            end_lr: 0.,
            curve_type: "linear".to_owned(),
            wd: None,
            batch_size: 1,
            seed: None,
            mom: 0.5,
            sqr_mom: 0.999,
        }
    }
}

impl TrainConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("failed to parse training config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open training config {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse training config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail once training starts.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.curve_type.parse::<Curve>()?;
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.lr <= 0. {
            bail!("lr must be positive, got {}", self.lr);
        }
        if self.l_a < 0. || self.l_b < 0. || self.l_idt < 0. {
            bail!("loss weights must be non-negative");
        }
        Ok(())
    }

    pub fn loss(&self) -> CycleGanLoss {
        CycleGanLossBuilder::default()
            .l_a(self.l_a)
            .l_b(self.l_b)
            .l_idt(self.l_idt)
            .lsgan(self.lsgan)
            .build()
    }

    /// An Adam factory with the configured moments.
    pub fn optimizer(&self) -> OptimizerFn {
        let mut builder = AdamBuilder::default().mom(self.mom).sqr_mom(self.sqr_mom);
        if let Some(wd) = self.wd {
            builder = builder.weight_decay(wd);
        }
        adam_fn(builder)
    }

    /// Batch two image stacks at `batch_size`, with the domain-B pairing drawn from `seed`.
    pub fn dataset(&self, domain_a: &Tensor, domain_b: &Tensor) -> UnpairedDataset {
        let dataset = UnpairedDataset::from_stacks(domain_a, domain_b, self.batch_size);
        match self.seed {
            Some(seed) => dataset.shuffle_b(seed),
            None => dataset,
        }
    }

    pub fn flat_lin(&self) -> FlatLinConfig {
        FlatLinConfig {
            n_epochs: self.n_epochs,
            n_epochs_decay: self.n_epochs_decay,
            start_lr: Some(self.lr),
            end_lr: self.end_lr,
            curve_type: self.curve_type.clone(),
            wd: self.wd,
            reset_opt: false,
        }
    }
}
