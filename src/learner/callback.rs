use std::any::Any;

use crate::error::Result;

use super::Learner;

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Hooks a [Learner] calls at fixed points of its training loop.
///
/// Every hook receives the learner itself and defaults to doing nothing. Callbacks run in
/// increasing [Callback::order]; ties keep insertion order.
#[allow(unused_variables)]
pub trait Callback: AsAny {
    fn order(&self) -> i32 {
        0
    }

    fn before_fit(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }

    fn before_epoch(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }

    /// Entering the training phase of an epoch.
    fn before_train(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }

    /// A batch has been loaded into `learn.xb` / `learn.yb`, before the forward pass.
    fn before_batch(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }

    /// The active optimizer has just stepped. Only called on training batches.
    fn after_step(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }

    /// The batch is done: prediction and loss are available, gradients have been zeroed.
    fn after_batch(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }

    fn after_train(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }

    /// Entering the validation phase of an epoch.
    fn before_validate(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }

    fn after_validate(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }

    fn after_epoch(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }

    fn after_fit(&mut self, learn: &mut Learner) -> Result<()> {
        Ok(())
    }
}

/// The points of the training loop at which callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    BeforeFit,
    BeforeEpoch,
    BeforeTrain,
    BeforeBatch,
    AfterStep,
    AfterBatch,
    AfterTrain,
    BeforeValidate,
    AfterValidate,
    AfterEpoch,
    AfterFit,
}

impl Event {
    pub fn dispatch(self, cb: &mut dyn Callback, learn: &mut Learner) -> Result<()> {
        match self {
            Event::BeforeFit => cb.before_fit(learn),
            Event::BeforeEpoch => cb.before_epoch(learn),
            Event::BeforeTrain => cb.before_train(learn),
            Event::BeforeBatch => cb.before_batch(learn),
            Event::AfterStep => cb.after_step(learn),
            Event::AfterBatch => cb.after_batch(learn),
            Event::AfterTrain => cb.after_train(learn),
            Event::BeforeValidate => cb.before_validate(learn),
            Event::AfterValidate => cb.after_validate(learn),
            Event::AfterEpoch => cb.after_epoch(learn),
            Event::AfterFit => cb.after_fit(learn),
        }
    }
}
