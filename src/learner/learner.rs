use std::mem;

use tch::Tensor;

use crate::{
    core::TensorCell,
    dataset::{Batch, DataLoaders},
    error::{Error, Result},
    loss::CycleGanLoss,
    nn::{CycleGan, CycleGanOutput, Trainable},
    optim::{combined_flat_anneal, trainable_params, Optimizer, OptimizerFn, Splitter},
};

use super::{Callback, Event, ParamScheduler, Recorder};

struct CallbackEntry {
    cb: Box<dyn Callback>,
    /// Removed again once the `fit` that added it returns.
    temporary: bool,
}

/// Drives the training loop of a [CycleGan] and dispatches [Callback] hooks.
///
/// Every field a callback may need to read or replace is public: the current batch, the
/// prediction, the loss, the progress counters and the active optimizer.
pub struct Learner {
    pub dls: DataLoaders,
    pub model: CycleGan,
    pub loss_func: CycleGanLoss,
    pub opt_func: OptimizerFn,
    pub splitter: Splitter,
    pub lr: f64,
    pub opt: Option<Optimizer>,

    pub xb: Vec<Tensor>,
    pub yb: Vec<Tensor>,
    pub pred: Option<CycleGanOutput>,
    pub loss: Option<Tensor>,

    pub training: bool,
    pub epoch: usize,
    pub n_epoch: usize,
    pub iter: usize,
    pub n_iter: usize,
    /// Training batches seen over the learner's lifetime.
    pub train_iter: usize,
    /// Progress through the current `fit`, in [0, 1].
    pub pct_train: f64,

    pub recorder: Recorder,
    cbs: Vec<CallbackEntry>,
}

/// Arguments of [Learner::fit_flat_lin].
#[derive(Debug, Clone, PartialEq)]
pub struct FlatLinConfig {
    /// Epochs at the constant learning rate.
    pub n_epochs: usize,
    /// Epochs of annealing that follow.
    pub n_epochs_decay: usize,
    /// Defaults to the learner's `lr`.
    pub start_lr: Option<f64>,
    pub end_lr: f64,
    pub curve_type: String,
    pub wd: Option<f64>,
    pub reset_opt: bool,
}

impl Default for FlatLinConfig {
    fn default() -> Self {
        Self {
            n_epochs: 100,
            n_epochs_decay: 100,
            start_lr: None,
            end_lr: 0.,
            curve_type: "linear".to_owned(),
            wd: None,
            reset_opt: false,
        }
    }
}

impl Learner {
    pub fn new(
        dls: DataLoaders,
        model: CycleGan,
        loss_func: CycleGanLoss,
        opt_func: OptimizerFn,
    ) -> Learner {
        Learner {
            dls,
            model,
            loss_func,
            opt_func,
            splitter: trainable_params,
            lr: 1e-3,
            opt: None,
            xb: Vec::new(),
            yb: Vec::new(),
            pred: None,
            loss: None,
            training: false,
            epoch: 0,
            n_epoch: 1,
            iter: 0,
            n_iter: 0,
            train_iter: 0,
            pct_train: 0.,
            recorder: Recorder::default(),
            cbs: Vec::new(),
        }
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Register a callback for every following `fit`.
    pub fn add_cb(&mut self, cb: Box<dyn Callback>) {
        self.push_cb(cb, false);
    }

    fn push_cb(&mut self, cb: Box<dyn Callback>, temporary: bool) {
        self.cbs.push(CallbackEntry { cb, temporary });
        // Stable, so equal orders keep insertion order.
        self.cbs.sort_by_key(|entry| entry.cb.order());
    }

    /// The first registered callback of type `T`.
    pub fn callback<T: Callback + 'static>(&self) -> Option<&T> {
        self.cbs
            .iter()
            .find_map(|entry| (*entry.cb).as_any().downcast_ref::<T>())
    }

    /// Build an optimizer over `params` with the learner's factory, splitter and `lr`.
    pub fn build_opt(&self, params: Vec<TensorCell>) -> Optimizer {
        (self.opt_func)((self.splitter)(params), self.lr)
    }

    /// Replace the active optimizer with a fresh one over every model parameter.
    pub fn create_opt(&mut self) {
        self.opt = Some(self.build_opt(self.model.parameter_list()));
    }

    pub fn opt(&self) -> Result<&Optimizer> {
        self.opt.as_ref().ok_or(Error::MissingOptimizer)
    }

    fn run_cbs(&mut self, event: Event) -> Result<()> {
        let mut cbs = mem::take(&mut self.cbs);
        let result = cbs
            .iter_mut()
            .try_for_each(|entry| event.dispatch(entry.cb.as_mut(), self));
        // Keep anything a hook registered while the list was out.
        cbs.append(&mut self.cbs);
        self.cbs = cbs;
        result
    }

    /// Train for `n_epoch` epochs with `cbs` added for this call only.
    pub fn fit(
        &mut self,
        n_epoch: usize,
        cbs: Vec<Box<dyn Callback>>,
        reset_opt: bool,
        wd: Option<f64>,
    ) -> Result<()> {
        for cb in cbs {
            self.push_cb(cb, true);
        }
        let result = self.do_fit(n_epoch, reset_opt, wd);
        self.cbs.retain(|entry| !entry.temporary);
        result
    }

    fn do_fit(&mut self, n_epoch: usize, reset_opt: bool, wd: Option<f64>) -> Result<()> {
        if reset_opt || self.opt.is_none() {
            self.create_opt();
        }
        if let Some(wd) = wd {
            self.opt()?.set_hyper("wd", wd);
        }
        self.n_epoch = n_epoch;
        self.pct_train = 0.;
        self.recorder.before_fit();
        self.run_cbs(Event::BeforeFit)?;
        for epoch in 0..n_epoch {
            self.epoch = epoch;
            self.run_cbs(Event::BeforeEpoch)?;
            self.do_train()?;
            self.do_validate()?;
            self.recorder.after_epoch(epoch);
            self.run_cbs(Event::AfterEpoch)?;
        }
        self.pct_train = 1.;
        self.run_cbs(Event::AfterFit)
    }

    fn do_train(&mut self) -> Result<()> {
        self.training = true;
        self.model.train();
        self.recorder.before_phase(true);
        self.run_cbs(Event::BeforeTrain)?;
        let batches = self.dls.train_batches();
        self.n_iter = batches.len();
        for (iter, batch) in batches.into_iter().enumerate() {
            self.iter = iter;
            self.pct_train =
                (self.epoch as f64 + iter as f64 / self.n_iter as f64) / self.n_epoch as f64;
            self.one_batch(batch)?;
        }
        self.run_cbs(Event::AfterTrain)?;
        self.recorder.after_phase(true);
        Ok(())
    }

    fn do_validate(&mut self) -> Result<()> {
        self.training = false;
        self.model.eval();
        let _guard = tch::no_grad_guard();
        self.recorder.before_phase(false);
        self.run_cbs(Event::BeforeValidate)?;
        let batches = self.dls.valid_batches();
        self.n_iter = batches.len();
        for (iter, batch) in batches.into_iter().enumerate() {
            self.iter = iter;
            self.one_batch(batch)?;
        }
        self.run_cbs(Event::AfterValidate)?;
        self.recorder.after_phase(false);
        Ok(())
    }

    fn one_batch(&mut self, batch: Batch) -> Result<()> {
        self.xb = batch.xb;
        self.yb = batch.yb;
        self.pred = None;
        self.loss = None;
        self.run_cbs(Event::BeforeBatch)?;

        let pred = self.model.forward_batch(&self.xb)?;
        let loss = self.loss_func.generator_loss(&pred)?.total();
        self.pred = Some(pred);
        if self.training {
            loss.backward();
            self.loss = Some(loss);
            self.opt()?.step();
            self.run_cbs(Event::AfterStep)?;
            self.opt()?.zero_grad();
        } else {
            self.loss = Some(loss);
        }
        self.run_cbs(Event::AfterBatch)?;

        let mut recorder = mem::take(&mut self.recorder);
        let recorded = recorder.after_batch(self);
        self.recorder = recorder;
        recorded?;
        if self.training {
            self.train_iter += 1;
        }
        Ok(())
    }

    /// Train at a constant learning rate for `n_epochs`, then anneal it to `end_lr` over
    /// `n_epochs_decay` more along `curve_type`.
    pub fn fit_flat_lin(
        &mut self,
        config: FlatLinConfig,
        cbs: Vec<Box<dyn Callback>>,
    ) -> Result<()> {
        let total_epochs = config.n_epochs + config.n_epochs_decay;
        let pct_start = if total_epochs == 0 {
            1.
        } else {
            config.n_epochs as f64 / total_epochs as f64
        };
        if self.opt.is_none() {
            self.create_opt();
        }
        let start_lr = config.start_lr.unwrap_or(self.lr);
        let opt = self.opt()?;
        opt.set_hyper("lr", start_lr);
        let scheds = opt
            .hyper("lr")
            .into_iter()
            .map(|lr| combined_flat_anneal(pct_start, lr, config.end_lr, &config.curve_type))
            .collect::<Result<Vec<_>>>()?;

        let mut all_cbs: Vec<Box<dyn Callback>> = vec![Box::new(ParamScheduler::new("lr", scheds))];
        all_cbs.extend(cbs);
        self.fit(total_epochs, all_cbs, config.reset_opt, config.wd)
    }
}
