use crate::{error::Result, optim::Schedule};

use super::{Callback, Learner};

/// Sets hyperparameter `name` on the active optimizer before every training batch, one
/// [Schedule] per parameter group (or a single one for all groups), evaluated at the
/// learner's training progress.
#[derive(Debug, Clone)]
pub struct ParamScheduler {
    name: String,
    scheds: Vec<Schedule>,
    /// Values applied at every training batch.
    pub hps: Vec<Vec<f64>>,
}

impl ParamScheduler {
    pub fn new(name: impl Into<String>, scheds: Vec<Schedule>) -> Self {
        Self {
            name: name.into(),
            scheds,
            hps: Vec::new(),
        }
    }
}

impl Callback for ParamScheduler {
    fn order(&self) -> i32 {
        60
    }

    fn before_batch(&mut self, learn: &mut Learner) -> Result<()> {
        if !learn.training {
            return Ok(());
        }
        let values: Vec<f64> = self
            .scheds
            .iter()
            .map(|sched| sched.at(learn.pct_train))
            .collect();
        learn.opt()?.set_hyper_groups(&self.name, &values)?;
        self.hps.push(values);
        Ok(())
    }
}
