use cyclegan_derive::PartialBuilder;
use serde::Serialize;
use tch::{Reduction, Tensor};

use crate::{
    core::scalar,
    error::{Error, Result},
    nn::{CycleGan, CycleGanOutput, Module, SubNetworks},
};

use super::AdversarialCriterion;

/// The six generator-phase loss terms of one batch.
#[derive(Debug)]
pub struct GeneratorLosses {
    pub id_loss_a: Tensor,
    pub id_loss_b: Tensor,
    pub gen_loss_a: Tensor,
    pub gen_loss_b: Tensor,
    pub cyc_loss_a: Tensor,
    pub cyc_loss_b: Tensor,
}

impl GeneratorLosses {
    /// The scalar the generators are optimized against.
    pub fn total(&self) -> Tensor {
        &self.id_loss_a
            + &self.id_loss_b
            + &self.gen_loss_a
            + &self.gen_loss_b
            + &self.cyc_loss_a
            + &self.cyc_loss_b
    }
}

/// The two discriminator losses of one batch. They are kept apart so that each
/// discriminator is back-propagated on its own.
#[derive(Debug)]
pub struct DiscriminatorLosses {
    pub d_a_loss: Tensor,
    pub d_b_loss: Tensor,
}

/// Scalar values of every loss term, as last computed. Read by the loss metrics after each batch.
///
/// The generator terms and the discriminator terms are written by separate calls, so they only
/// describe the same batch once both phases have run for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LossComponents {
    pub id_loss_a: Option<f64>,
    pub id_loss_b: Option<f64>,
    pub gen_loss_a: Option<f64>,
    pub gen_loss_b: Option<f64>,
    pub cyc_loss_a: Option<f64>,
    pub cyc_loss_b: Option<f64>,
    pub d_a_loss: Option<f64>,
    pub d_b_loss: Option<f64>,
}

impl LossComponents {
    pub const FIELDS: [&'static str; 8] = [
        "id_loss_A",
        "id_loss_B",
        "gen_loss_A",
        "gen_loss_B",
        "cyc_loss_A",
        "cyc_loss_B",
        "D_A_loss",
        "D_B_loss",
    ];

    /// Look a term up by its reporting name (one of [LossComponents::FIELDS]).
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "id_loss_A" => self.id_loss_a,
            "id_loss_B" => self.id_loss_b,
            "gen_loss_A" => self.gen_loss_a,
            "gen_loss_B" => self.gen_loss_b,
            "cyc_loss_A" => self.cyc_loss_a,
            "cyc_loss_B" => self.cyc_loss_b,
            "D_A_loss" => self.d_a_loss,
            "D_B_loss" => self.d_b_loss,
            _ => None,
        }
    }

    fn record_generator(&mut self, losses: &GeneratorLosses) {
        self.id_loss_a = Some(scalar(&losses.id_loss_a));
        self.id_loss_b = Some(scalar(&losses.id_loss_b));
        self.gen_loss_a = Some(scalar(&losses.gen_loss_a));
        self.gen_loss_b = Some(scalar(&losses.gen_loss_b));
        self.cyc_loss_a = Some(scalar(&losses.cyc_loss_a));
        self.cyc_loss_b = Some(scalar(&losses.cyc_loss_b));
    }

    fn record_discriminator(&mut self, losses: &DiscriminatorLosses) {
        self.d_a_loss = Some(scalar(&losses.d_a_loss));
        self.d_b_loss = Some(scalar(&losses.d_b_loss));
    }
}

/// Identity, adversarial and cycle-consistency losses for a [CycleGan].
#[derive(Debug, PartialBuilder)]
pub struct CycleGanLoss {
    /// Weight of the domain A cycle loss (lambda_A).
    #[builder(default = "10.")]
    pub l_a: f64,
    /// Weight of the domain B cycle loss (lambda_B).
    #[builder(default = "10.")]
    pub l_b: f64,
    /// Weight of the identity losses, relative to the cycle weights.
    #[builder(default = "0.5")]
    pub l_idt: f64,
    /// Use the least-squares objective instead of binary cross entropy.
    #[builder(default = "true")]
    pub lsgan: bool,

    crit: AdversarialCriterion,
    nets: Option<SubNetworks>,
    real: Option<(Tensor, Tensor)>,
    components: LossComponents,
}

impl CycleGanLoss {
    pub fn new(config: CycleGanLossConfig) -> CycleGanLoss {
        CycleGanLoss {
            l_a: config.l_a,
            l_b: config.l_b,
            l_idt: config.l_idt,
            lsgan: config.lsgan,
            crit: AdversarialCriterion::new(config.lsgan),
            nets: None,
            real: None,
            components: LossComponents::default(),
        }
    }

    /// Attach the loss to the model whose sub-networks it calls.
    pub fn bind(mut self, model: &CycleGan) -> CycleGanLoss {
        self.nets = Some(model.nets());
        self
    }

    pub fn crit(&self) -> &AdversarialCriterion {
        &self.crit
    }

    /// The scalar values recorded by the latest generator and discriminator calls.
    pub fn components(&self) -> &LossComponents {
        &self.components
    }

    /// Store the real images of the current batch. Must be called once per batch before either
    /// loss is computed.
    pub fn set_input(&mut self, real_a: &Tensor, real_b: &Tensor) {
        self.real = Some((real_a.shallow_clone(), real_b.shallow_clone()));
    }

    fn state(&self) -> Result<(&SubNetworks, &Tensor, &Tensor)> {
        let nets = self.nets.as_ref().ok_or(Error::UnboundLoss)?;
        let (real_a, real_b) = self.real.as_ref().ok_or(Error::MissingInput)?;
        Ok((nets, real_a, real_b))
    }

    /// Generator-phase loss over the model output `(fake_a, fake_b, idt_a, idt_b)`.
    pub fn generator_loss(&mut self, output: &CycleGanOutput) -> Result<GeneratorLosses> {
        let (nets, real_a, real_b) = self.state()?;
        let crit = &self.crit;

        // Each generator should leave images of its own output domain untouched.
        let id_loss_a = self.l_idt * self.l_a * output.idt_a.f_l1_loss(real_a, Reduction::Mean)?;
        let id_loss_b = self.l_idt * self.l_b * output.idt_b.f_l1_loss(real_b, Reduction::Mean)?;

        let gen_loss_a = crit.loss(&nets.d_a.forward(&output.fake_a), 1.)?;
        let gen_loss_b = crit.loss(&nets.d_b.forward(&output.fake_b), 1.)?;

        // Translate each fake back to where it came from.
        let cyc_loss_a = self.l_a
            * nets
                .g_a
                .forward(&output.fake_b)
                .f_l1_loss(real_a, Reduction::Mean)?;
        let cyc_loss_b = self.l_b
            * nets
                .g_b
                .forward(&output.fake_a)
                .f_l1_loss(real_b, Reduction::Mean)?;

        let losses = GeneratorLosses {
            id_loss_a,
            id_loss_b,
            gen_loss_a,
            gen_loss_b,
            cyc_loss_a,
            cyc_loss_b,
        };
        self.components.record_generator(&losses);
        Ok(losses)
    }

    /// Discriminator-phase loss. `fakes` should be detached from the generators.
    pub fn discriminator_loss(
        &mut self,
        fakes: (&Tensor, &Tensor),
        reals: (&Tensor, &Tensor),
    ) -> Result<DiscriminatorLosses> {
        let nets = self.nets.as_ref().ok_or(Error::UnboundLoss)?;
        let crit = &self.crit;
        let (fake_a, fake_b) = fakes;
        let (real_a, real_b) = reals;

        let d_a_loss =
            0.5 * (crit.loss(&nets.d_a.forward(real_a), 1.)? + crit.loss(&nets.d_a.forward(fake_a), 0.)?);
        let d_b_loss =
            0.5 * (crit.loss(&nets.d_b.forward(real_b), 1.)? + crit.loss(&nets.d_b.forward(fake_b), 0.)?);

        let losses = DiscriminatorLosses { d_a_loss, d_b_loss };
        self.components.record_discriminator(&losses);
        Ok(losses)
    }
}
