pub use callback::*;
pub use learner::*;
pub use metric::*;
pub use param_scheduler::*;
pub use recorder::*;
pub use trainer::*;

pub mod callback;
#[allow(clippy::module_inception)]
pub mod learner;
pub mod metric;
pub mod param_scheduler;
pub mod recorder;
pub mod trainer;

use crate::{
    dataset::DataLoaders,
    loss::{CycleGanLoss, LossComponents},
    nn::CycleGan,
    optim::OptimizerFn,
};

/// Assemble a [Learner] for CycleGAN training.
///
/// The loss is bound to `model`, a [CycleGanTrainer] is registered, and every loss term in
/// [LossComponents::FIELDS] is reported alongside `metrics`. Metrics are recorded on training
/// batches only.
pub fn cycle_learner(
    dls: DataLoaders,
    model: CycleGan,
    loss_func: CycleGanLoss,
    opt_func: OptimizerFn,
    metrics: Vec<Box<dyn ScoreFn>>,
    cbs: Vec<Box<dyn Callback>>,
) -> Learner {
    let loss_func = loss_func.bind(&model);
    let mut learn = Learner::new(dls, model, loss_func, opt_func);
    learn.add_cb(Box::new(CycleGanTrainer::new()));
    for cb in cbs {
        learn.add_cb(cb);
    }
    for field in LossComponents::FIELDS {
        learn.recorder.add_metric(Box::new(LossMetric::new(field)));
    }
    for func in metrics {
        learn.recorder.add_metric(Box::new(AvgMetric::new(func, true)));
    }
    learn.recorder.train_metrics = true;
    learn.recorder.valid_metrics = false;
    learn
}
