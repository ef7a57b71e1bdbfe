use std::{f64::consts::PI, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Interpolation between a start and an end value over a position in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    /// Stays at the start value.
    Flat,
    Linear,
    Cosine,
    Exponential,
}

impl Curve {
    pub fn at(&self, start: f64, end: f64, pos: f64) -> f64 {
        match self {
            Curve::Flat => start,
            Curve::Linear => start + pos * (end - start),
            Curve::Cosine => start + (1. + (PI * (1. - pos)).cos()) * (end - start) / 2.,
            Curve::Exponential => start * (end / start).powf(pos),
        }
    }
}

/// The annealing curves accepted by name.
impl FromStr for Curve {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(Curve::Linear),
            "cosine" => Ok(Curve::Cosine),
            "exponential" => Ok(Curve::Exponential),
            _ => Err(Error::InvalidCurveType(name.to_owned())),
        }
    }
}

/// One schedule segment: a curve from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sched {
    pub curve: Curve,
    pub start: f64,
    pub end: f64,
}

impl Sched {
    pub fn new(curve: Curve, start: f64, end: f64) -> Self {
        Self { curve, start, end }
    }

    pub fn flat(value: f64) -> Self {
        Self::new(Curve::Flat, value, value)
    }

    pub fn at(&self, pos: f64) -> f64 {
        self.curve.at(self.start, self.end, pos)
    }
}

/// Several [Sched]s laid end to end over the training progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    bounds: Vec<f64>,
    scheds: Vec<Sched>,
}

impl Schedule {
    /// Value at training progress `pos` in [0, 1].
    pub fn at(&self, pos: f64) -> f64 {
        let last = self.scheds.len() - 1;
        let idx = self
            .bounds
            .iter()
            .rposition(|&bound| pos >= bound)
            .unwrap_or(0)
            .min(last);
        let width = self.bounds[idx + 1] - self.bounds[idx];
        // A zero-width segment can only be reached at its own start.
        let actual_pos = if width > 0. {
            (pos - self.bounds[idx]) / width
        } else {
            0.
        };
        self.scheds[idx].at(actual_pos)
    }
}

/// Concatenate `scheds`, giving each the share of training in `pcts`. The shares must be
/// non-negative and sum to one.
pub fn combine_scheds(pcts: &[f64], scheds: Vec<Sched>) -> Result<Schedule> {
    if pcts.len() != scheds.len() || scheds.is_empty() {
        return Err(Error::InvalidSchedule(format!(
            "{} proportions for {} segments",
            pcts.len(),
            scheds.len()
        )));
    }
    if pcts.iter().any(|&pct| pct < 0.) {
        return Err(Error::InvalidSchedule(format!(
            "negative proportion in {:?}",
            pcts
        )));
    }
    let total: f64 = pcts.iter().sum();
    if (total - 1.).abs() > 1e-9 {
        return Err(Error::InvalidSchedule(format!(
            "proportions sum to {}, not 1",
            total
        )));
    }
    let bounds = std::iter::once(0.)
        .chain(pcts.iter().scan(0., |acc, pct| {
            *acc += pct;
            Some(*acc)
        }))
        .collect();
    Ok(Schedule { bounds, scheds })
}

/// Constant `start_lr` for the first `pct` of training, then `curve_type` annealing to `end_lr`.
pub fn combined_flat_anneal(
    pct: f64,
    start_lr: f64,
    end_lr: f64,
    curve_type: &str,
) -> Result<Schedule> {
    let curve: Curve = curve_type.parse()?;
    if !(0. ..=1.).contains(&pct) {
        return Err(Error::InvalidPct(pct));
    }
    combine_scheds(
        &[pct, 1. - pct],
        vec![Sched::flat(start_lr), Sched::new(curve, start_lr, end_lr)],
    )
}
