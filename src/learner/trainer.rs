use tracing::debug;

use crate::{
    error::{check_arity, Error, Result},
    loss::AdversarialCriterion,
    nn::{Phase, SubNetworks},
    optim::Optimizer,
};

use super::{Callback, Learner};

/// Alternates generator and discriminator updates within every training batch.
///
/// The learner only knows about one optimizer. This callback installs the generator optimizer
/// as the learner's active one, so the learner's own backward and step update `G_A` and `G_B`.
/// After the batch it updates `D_A` and `D_B` with a second optimizer on the detached
/// translations. Hyperparameters set on the learner's optimizer (by a scheduler, say) are
/// copied to the discriminator optimizer after each step.
#[derive(Debug, Default)]
pub struct CycleGanTrainer {
    nets: Option<SubNetworks>,
    crit: Option<AdversarialCriterion>,
    opt_g: Option<Optimizer>,
    opt_d: Option<Optimizer>,
    training: bool,
}

impl CycleGanTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The optimizer over `G_A` and `G_B`, once the first training phase has started.
    pub fn opt_g(&self) -> Result<&Optimizer> {
        self.opt_g.as_ref().ok_or(Error::MissingOptimizer)
    }

    /// The optimizer over `D_A` and `D_B`, once the first training phase has started.
    pub fn opt_d(&self) -> Result<&Optimizer> {
        self.opt_d.as_ref().ok_or(Error::MissingOptimizer)
    }

    pub fn crit(&self) -> Option<&AdversarialCriterion> {
        self.crit.as_ref()
    }

    fn capture(&mut self, learn: &Learner) -> SubNetworks {
        let nets = learn.model.nets();
        self.nets = Some(nets.clone());
        self.crit = Some(*learn.loss_func.crit());
        nets
    }

    /// Build both optimizers on first use, then copy the learner's hyperparameters onto them.
    ///
    /// A learner optimizer other than `opt_g` was freshly built by the learner, so the
    /// accumulated state of both optimizers is dropped as well.
    fn ensure_optimizers(&mut self, learn: &Learner, nets: &SubNetworks) -> Result<()> {
        let source = learn.opt()?;
        let reset = match &self.opt_g {
            Some(opt_g) => !source.same(opt_g),
            None => false,
        };
        let opt_g = match self.opt_g.take() {
            Some(opt_g) => opt_g,
            None => {
                let opt_g = learn.build_opt(nets.generator_parameters());
                debug!(
                    params = opt_g.num_params(),
                    groups = opt_g.num_groups(),
                    "created generator optimizer"
                );
                opt_g
            }
        };
        let opt_d = match self.opt_d.take() {
            Some(opt_d) => opt_d,
            None => {
                let opt_d = learn.build_opt(nets.discriminator_parameters());
                debug!(
                    params = opt_d.num_params(),
                    groups = opt_d.num_groups(),
                    "created discriminator optimizer"
                );
                opt_d
            }
        };
        let synced = opt_g
            .sync_hypers_from(source)
            .and_then(|_| opt_d.sync_hypers_from(source));
        if reset {
            debug!("cleared generator and discriminator optimizer state");
            opt_g.clear_state();
            opt_d.clear_state();
        }
        self.opt_g = Some(opt_g);
        self.opt_d = Some(opt_d);
        synced
    }

    /// One discriminator update on the detached translations of the current batch.
    fn discriminator_step(&self, learn: &Learner, nets: &SubNetworks) -> Result<()> {
        let opt_d = self.opt_d()?;
        opt_d.sync_hypers_from(learn.opt()?)?;
        nets.zero_grad_discriminators();

        check_arity("model input", &learn.xb, 2)?;
        let (fake_a, fake_b) = learn
            .pred
            .as_ref()
            .ok_or(Error::MissingPrediction)?
            .detached_fakes();
        let losses = learn
            .loss_func
            .discriminator_loss((&fake_a, &fake_b), (&learn.xb[0], &learn.xb[1]))?;
        losses.d_a_loss.backward();
        losses.d_b_loss.backward();
        opt_d.step();
        Ok(())
    }
}

impl Callback for CycleGanTrainer {
    fn before_train(&mut self, learn: &mut Learner) -> Result<()> {
        let nets = self.capture(learn);
        self.ensure_optimizers(learn, &nets)?;
        learn.opt = self.opt_g.clone();
        learn.model.set_phase(Phase::Generators);
        Ok(())
    }

    fn before_batch(&mut self, learn: &mut Learner) -> Result<()> {
        self.training = learn.model.is_training();
        check_arity("batch inputs", &learn.xb, 1)?;
        check_arity("batch targets", &learn.yb, 1)?;
        let real_a = learn.xb.remove(0);
        let real_b = learn.yb[0].shallow_clone();
        learn.loss_func.set_input(&real_a, &real_b);
        learn.xb = vec![real_a, real_b];
        Ok(())
    }

    fn after_step(&mut self, learn: &mut Learner) -> Result<()> {
        self.opt_d()?.sync_hypers_from(learn.opt()?)
    }

    fn after_batch(&mut self, learn: &mut Learner) -> Result<()> {
        let nets = match self.nets.clone() {
            Some(nets) => nets,
            None => self.capture(learn),
        };
        nets.zero_grad_generators();
        if !self.training {
            return Ok(());
        }

        learn.model.set_phase(Phase::Discriminators);
        let result = self.discriminator_step(learn, &nets);
        learn.model.set_phase(Phase::Generators);
        result
    }

    fn before_validate(&mut self, learn: &mut Learner) -> Result<()> {
        self.capture(learn);
        Ok(())
    }
}
