use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tch::{Reduction, Tensor};

use crate::error::{Error, Result};

/// The elementwise loss an [AdversarialCriterion] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseLoss {
    /// Mean squared error, the least-squares GAN objective. Works on raw logits.
    Mse,
    /// Binary cross entropy. Expects discriminator outputs in (0, 1).
    Bce,
}

impl FromStr for BaseLoss {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mse" | "lsgan" => Ok(BaseLoss::Mse),
            "bce" => Ok(BaseLoss::Bce),
            _ => Err(Error::InvalidBaseLoss(name.to_owned())),
        }
    }
}

/// Compares a discriminator's output map against a single real/fake label.
///
/// The label is broadcast to the shape of the output before the base loss is applied, so
/// patch discriminators with any output shape are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdversarialCriterion {
    base: BaseLoss,
}

impl AdversarialCriterion {
    /// `lsgan` selects the MSE objective, otherwise BCE is used.
    pub fn new(lsgan: bool) -> Self {
        Self::with_base(if lsgan { BaseLoss::Mse } else { BaseLoss::Bce })
    }

    pub fn with_base(base: BaseLoss) -> Self {
        Self { base }
    }

    pub fn loss(&self, output: &Tensor, target: f64) -> Result<Tensor> {
        let target = Tensor::of_slice(&[target])
            .to_kind(output.kind())
            .to_device(output.device())
            .f_expand_as(output)?;
        let loss = match self.base {
            BaseLoss::Mse => output.f_mse_loss(&target, Reduction::Mean)?,
            BaseLoss::Bce => {
                output.f_binary_cross_entropy::<Tensor>(&target, None, Reduction::Mean)?
            }
        };
        Ok(loss)
    }
}
