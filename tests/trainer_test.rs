mod common;

use cyclegan::{
    core::has_grad,
    learner::{Callback, CycleGanTrainer, Learner},
    nn::{Phase, Trainable},
    Error, Result,
};
use tch::Tensor;

/// Checks the trainability flags and optimizer wiring around every batch.
#[derive(Default)]
struct PhaseProbe {
    batches: usize,
    g_steps_seen: Vec<usize>,
}

impl Callback for PhaseProbe {
    fn order(&self) -> i32 {
        10
    }

    fn before_batch(&mut self, learn: &mut Learner) -> Result<()> {
        if learn.training {
            assert_eq!(learn.model.nets().phase(), Some(Phase::Generators));
        }
        // The trainer has already packed both domains into the model input.
        assert_eq!(learn.xb.len(), 2);
        Ok(())
    }

    fn after_batch(&mut self, learn: &mut Learner) -> Result<()> {
        self.batches += 1;
        let nets = learn.model.nets();
        if learn.training {
            assert_eq!(nets.phase(), Some(Phase::Generators));
        }
        for param in nets.generator_parameters() {
            assert!(!has_grad(&param.lock()));
        }
        self.g_steps_seen.push(learn.opt()?.step_count());
        Ok(())
    }
}

#[test]
fn discriminator_steps_once_per_training_batch() {
    let dls = common::dls(3, Some(2), 2);
    let n_train = dls.train.num_batches();
    let n_valid = dls.valid.as_ref().map(|v| v.num_batches()).unwrap_or(0);
    assert_eq!((n_train, n_valid), (2, 1));

    let mut learn = common::learner(dls);
    learn.fit(2, vec![Box::new(PhaseProbe::default())], false, None).unwrap();

    let trainer = learn.callback::<CycleGanTrainer>().unwrap();
    assert!(trainer.crit().is_some());
    let opt_g = trainer.opt_g().unwrap();
    let opt_d = trainer.opt_d().unwrap();
    assert_eq!(opt_g.step_count(), 2 * n_train);
    assert_eq!(opt_d.step_count(), 2 * n_train);
    assert!(!opt_g.same(opt_d));
    assert!(learn.opt().unwrap().same(opt_g));
    assert_eq!(learn.train_iter, 2 * n_train);
    assert_eq!(
        opt_g.num_params() + opt_d.num_params(),
        learn.model.parameter_size()
    );

    // Temporary callbacks are gone after the fit.
    assert!(learn.callback::<PhaseProbe>().is_none());
    assert_eq!(learn.model.nets().phase(), Some(Phase::Generators));
}

#[test]
fn probe_sees_every_batch() {
    let mut learn = common::learner(common::dls(2, Some(2), 1));
    learn.add_cb(Box::new(PhaseProbe::default()));
    learn.fit(1, Vec::new(), false, None).unwrap();
    let probe = learn.callback::<PhaseProbe>().unwrap();
    assert_eq!(probe.batches, 3 + 2);
    // The generator optimizer has stepped before each training batch ends and not during
    // validation.
    assert_eq!(probe.g_steps_seen, vec![1, 2, 3, 3, 3]);
}

#[test]
fn hyperparameters_reach_the_discriminator_optimizer() {
    let mut learn = common::learner(common::dls(2, None, 2));
    learn.fit(1, Vec::new(), false, Some(0.)).unwrap();
    let trainer = learn.callback::<CycleGanTrainer>().unwrap();
    let opt_g = trainer.opt_g().unwrap().clone();
    let opt_d = trainer.opt_d().unwrap().clone();
    opt_g.set_hyper("lr", 0.5);

    learn.fit(1, Vec::new(), false, None).unwrap();
    let trainer = learn.callback::<CycleGanTrainer>().unwrap();
    assert_eq!(trainer.opt_d().unwrap().hyper("lr"), vec![0.5]);
    assert!(trainer.opt_d().unwrap().same(&opt_d));
}

#[test]
fn weight_decay_reaches_both_optimizers_on_the_first_fit() {
    let mut learn = common::learner(common::dls(2, None, 2));
    learn.fit(1, Vec::new(), false, Some(0.)).unwrap();
    let trainer = learn.callback::<CycleGanTrainer>().unwrap();
    assert_eq!(trainer.opt_g().unwrap().hyper("wd"), vec![0.]);
    assert_eq!(trainer.opt_d().unwrap().hyper("wd"), vec![0.]);
    assert_eq!(trainer.opt_g().unwrap().hyper("lr"), vec![1e-3]);
}

/// Compares the first generator update of a fit with a fresh Adam step.
#[derive(Default)]
struct FirstStep {
    before: Vec<Tensor>,
    checked: usize,
}

impl Callback for FirstStep {
    fn before_batch(&mut self, learn: &mut Learner) -> Result<()> {
        if learn.training && learn.epoch == 0 && learn.iter == 0 {
            self.before = learn
                .model
                .nets()
                .generator_parameters()
                .iter()
                .map(|param| param.lock().copy())
                .collect();
        }
        Ok(())
    }

    fn after_step(&mut self, learn: &mut Learner) -> Result<()> {
        if self.before.is_empty() {
            return Ok(());
        }
        let params = learn.model.nets().generator_parameters();
        for (before, param) in self.before.drain(..).zip(params) {
            let param = param.lock();
            let grad = param.grad();
            // Bias-corrected Adam from empty state moves by lr * g / (|g| + eps).
            let expected = &grad * 1e-3 / (grad.abs() + 1e-5);
            let moved = before - &*param;
            assert!(moved.allclose(&expected, 0., 1e-6, false));
        }
        self.checked += 1;
        Ok(())
    }
}

#[test]
fn reset_opt_clears_optimizer_state() {
    let mut learn = common::learner(common::dls(2, None, 2));
    learn.fit(1, Vec::new(), false, Some(0.)).unwrap();
    let trainer = learn.callback::<CycleGanTrainer>().unwrap();
    let opt_g = trainer.opt_g().unwrap().clone();

    learn.add_cb(Box::new(FirstStep::default()));
    learn.fit(1, Vec::new(), true, Some(0.)).unwrap();
    assert_eq!(learn.callback::<FirstStep>().unwrap().checked, 1);
    // The trained optimizers are kept, only their state is dropped.
    let trainer = learn.callback::<CycleGanTrainer>().unwrap();
    assert!(trainer.opt_g().unwrap().same(&opt_g));
    assert!(learn.opt().unwrap().same(&opt_g));
}

/// Pushes an extra target tensor into the batch.
struct ExtraTarget;

impl Callback for ExtraTarget {
    fn order(&self) -> i32 {
        -1
    }

    fn before_batch(&mut self, learn: &mut Learner) -> Result<()> {
        let extra = learn.yb[0].shallow_clone();
        learn.yb.push(extra);
        Ok(())
    }
}

/// Adds a third model input once the generator step is done.
struct ExtraInput;

impl Callback for ExtraInput {
    fn order(&self) -> i32 {
        -1
    }

    fn after_batch(&mut self, learn: &mut Learner) -> Result<()> {
        let extra = learn.xb[0].shallow_clone();
        learn.xb.push(extra);
        Ok(())
    }
}

#[test]
fn failed_discriminator_step_restores_generator_phase() {
    let mut learn = common::learner(common::dls(2, None, 2));
    let result = learn.fit(1, vec![Box::new(ExtraInput)], false, None);
    assert!(matches!(
        result,
        Err(Error::Arity {
            expected: 2,
            actual: 3,
            ..
        })
    ));
    assert_eq!(learn.model.nets().phase(), Some(Phase::Generators));
}

#[test]
fn unexpected_batch_arity_is_fatal() {
    let mut learn = common::learner(common::dls(2, None, 2));
    let result = learn.fit(1, vec![Box::new(ExtraTarget)], false, None);
    assert!(matches!(
        result,
        Err(Error::Arity {
            expected: 1,
            actual: 2,
            ..
        })
    ));
}
