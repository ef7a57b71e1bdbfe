use serde::Serialize;
use tracing::{info, warn};

use crate::{core::scalar, error::Result};

use super::{metric::find_bs, Learner, Metric};

/// Losses and metric values at the end of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: Option<f64>,
    pub valid_loss: Option<f64>,
    pub metrics: Vec<(String, Option<f64>)>,
}

/// Accumulates the loss and the metrics over each phase and keeps a history per epoch.
///
/// The learner drives it after every callback has seen the batch, so loss terms written by
/// callbacks during `after_batch` are visible to the metrics.
pub struct Recorder {
    pub train_metrics: bool,
    pub valid_metrics: bool,
    pub metrics: Vec<Box<dyn Metric>>,
    /// One entry per epoch.
    pub values: Vec<EpochRecord>,
    /// Loss of every training batch.
    pub losses: Vec<f64>,
    /// Learning rate of the first parameter group at every training batch.
    pub lrs: Vec<f64>,

    loss_total: f64,
    loss_count: usize,
    train_loss: Option<f64>,
    valid_loss: Option<f64>,
    current: Vec<(String, Option<f64>)>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            train_metrics: false,
            valid_metrics: true,
            metrics: Vec::new(),
            values: Vec::new(),
            losses: Vec::new(),
            lrs: Vec::new(),
            loss_total: 0.,
            loss_count: 0,
            train_loss: None,
            valid_loss: None,
            current: Vec::new(),
        }
    }
}

impl Recorder {
    pub fn add_metric(&mut self, metric: Box<dyn Metric>) {
        self.metrics.push(metric);
    }

    fn records(&self, training: bool) -> bool {
        if training {
            self.train_metrics
        } else {
            self.valid_metrics
        }
    }

    /// Column names of [EpochRecord::metrics]. Prefixed by phase when both phases are recorded.
    pub fn metric_names(&self) -> Vec<String> {
        let both = self.train_metrics && self.valid_metrics;
        let mut names = Vec::new();
        for (phase, on) in [("train", self.train_metrics), ("valid", self.valid_metrics)] {
            if on {
                names.extend(self.metrics.iter().map(|metric| {
                    if both {
                        format!("{}_{}", phase, metric.name())
                    } else {
                        metric.name()
                    }
                }));
            }
        }
        names
    }

    pub(crate) fn before_fit(&mut self) {
        self.values.clear();
    }

    pub(crate) fn before_phase(&mut self, training: bool) {
        self.loss_total = 0.;
        self.loss_count = 0;
        if training {
            self.current.clear();
            self.train_loss = None;
            self.valid_loss = None;
        }
        if self.records(training) {
            self.metrics.iter_mut().for_each(|metric| metric.reset());
        }
    }

    pub(crate) fn after_batch(&mut self, learn: &Learner) -> Result<()> {
        let loss = match learn.loss.as_ref() {
            Some(loss) => scalar(loss),
            None => return Ok(()),
        };
        let bs = find_bs(learn)?;
        self.loss_total += loss * bs as f64;
        self.loss_count += bs;
        if learn.training {
            self.losses.push(loss);
            if let Some(lr) = learn.opt()?.hyper("lr").first() {
                self.lrs.push(*lr);
            }
        }
        if self.records(learn.training) {
            for metric in self.metrics.iter_mut() {
                metric.accumulate(learn)?;
            }
        }
        Ok(())
    }

    pub(crate) fn after_phase(&mut self, training: bool) {
        let loss = if self.loss_count == 0 {
            None
        } else {
            Some(self.loss_total / self.loss_count as f64)
        };
        if training {
            self.train_loss = loss;
        } else {
            self.valid_loss = loss;
        }
        if self.records(training) {
            let both = self.train_metrics && self.valid_metrics;
            let phase = if training { "train" } else { "valid" };
            for metric in self.metrics.iter() {
                let name = if both {
                    format!("{}_{}", phase, metric.name())
                } else {
                    metric.name()
                };
                self.current.push((name, metric.value()));
            }
        }
    }

    pub(crate) fn after_epoch(&mut self, epoch: usize) {
        let record = EpochRecord {
            epoch,
            train_loss: self.train_loss,
            valid_loss: self.valid_loss,
            metrics: std::mem::take(&mut self.current),
        };
        for (name, value) in record.metrics.iter() {
            if value.is_none() {
                warn!(epoch, metric = %name, "metric has no value");
            }
        }
        info!(
            epoch,
            train_loss = ?record.train_loss,
            valid_loss = ?record.valid_loss,
            metrics = ?record.metrics,
            "epoch finished"
        );
        self.values.push(record);
    }

    /// The value of metric column `name` at the last epoch.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.values
            .last()?
            .metrics
            .iter()
            .find(|(metric, _)| metric == name)
            .and_then(|(_, value)| *value)
    }
}
