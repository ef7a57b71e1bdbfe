use linked_hash_map::LinkedHashMap;
use tch::{Kind, Tensor};

use crate::error::{Error, Result};

use super::Learner;

/// Keyword arguments bound to a [ScoreFn].
pub type Kwargs = LinkedHashMap<String, f64>;

/// A running statistic over the batches of one phase.
pub trait Metric {
    fn reset(&mut self);

    fn accumulate(&mut self, learn: &Learner) -> Result<()>;

    /// The current value, or `None` when nothing has been accumulated.
    fn value(&self) -> Option<f64>;

    fn name(&self) -> String;
}

/// A scoring function over the tensors of a batch.
pub trait ScoreFn {
    fn name(&self) -> String;

    fn score(&self, args: &[Tensor], kwargs: &Kwargs) -> f64;

    /// The function this one wraps, if it is a [Partial].
    fn wrapped(&self) -> Option<&dyn ScoreFn> {
        None
    }
}

/// A named closure used as a [ScoreFn].
pub struct NamedFn<F> {
    name: String,
    func: F,
}

impl<F> NamedFn<F>
where
    F: Fn(&[Tensor], &Kwargs) -> f64,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> ScoreFn for NamedFn<F>
where
    F: Fn(&[Tensor], &Kwargs) -> f64,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn score(&self, args: &[Tensor], kwargs: &Kwargs) -> f64 {
        (self.func)(args, kwargs)
    }
}

/// A [ScoreFn] with some keyword arguments fixed. Keywords passed at call time override the
/// bound ones.
pub struct Partial<S> {
    func: S,
    kwargs: Kwargs,
}

impl<S: ScoreFn> ScoreFn for Partial<S> {
    fn name(&self) -> String {
        format!("partial({})", self.func.name())
    }

    fn score(&self, args: &[Tensor], kwargs: &Kwargs) -> f64 {
        let mut merged = self.kwargs.clone();
        for (key, value) in kwargs {
            merged.insert(key.clone(), *value);
        }
        self.func.score(args, &merged)
    }

    fn wrapped(&self) -> Option<&dyn ScoreFn> {
        Some(&self.func)
    }
}

pub fn partial<S, I, K>(func: S, kwargs: I) -> Partial<S>
where
    S: ScoreFn,
    I: IntoIterator<Item = (K, f64)>,
    K: Into<String>,
{
    Partial {
        func,
        kwargs: kwargs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    }
}

/// Leading dimension of the first target (or input) tensor of the current batch.
pub fn find_bs(learn: &Learner) -> Result<usize> {
    learn
        .yb
        .first()
        .or_else(|| learn.xb.first())
        .map(|t| t.size()[0] as usize)
        .ok_or(Error::Arity {
            what: "batch",
            expected: 1,
            actual: 0,
        })
}

/// Averages a [ScoreFn] over batches, weighting each batch by its size.
///
/// The score function receives `xb ++ pred ++ yb`. With `decode` set, every tensor is first
/// mapped back through the data normalization.
pub struct AvgMetric {
    func: Box<dyn ScoreFn>,
    decode: bool,
    total: f64,
    count: usize,
}

impl AvgMetric {
    pub fn new(func: Box<dyn ScoreFn>, decode: bool) -> Self {
        Self {
            func,
            decode,
            total: 0.,
            count: 0,
        }
    }
}

impl Metric for AvgMetric {
    fn reset(&mut self) {
        self.total = 0.;
        self.count = 0;
    }

    fn accumulate(&mut self, learn: &Learner) -> Result<()> {
        let bs = find_bs(learn)?;
        let pred = learn.pred.as_ref().ok_or(Error::MissingPrediction)?;
        let args: Vec<Tensor> = learn
            .xb
            .iter()
            .map(Tensor::shallow_clone)
            .chain(pred.to_vec())
            .chain(learn.yb.iter().map(Tensor::shallow_clone))
            .map(|t| {
                let t = t.detach();
                if self.decode {
                    learn.dls.decode(&t).to_kind(Kind::Float)
                } else {
                    t
                }
            })
            .collect();
        self.total += self.func.score(&args, &Kwargs::new()) * bs as f64;
        self.count += bs;
        Ok(())
    }

    fn value(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total / self.count as f64)
        }
    }

    fn name(&self) -> String {
        match self.func.wrapped() {
            Some(inner) => inner.name(),
            None => self.func.name(),
        }
    }
}

/// Averages one recorded loss term (see [crate::loss::LossComponents::FIELDS]) by batch size.
pub struct LossMetric {
    field: String,
    total: f64,
    count: usize,
}

impl LossMetric {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            total: 0.,
            count: 0,
        }
    }
}

impl Metric for LossMetric {
    fn reset(&mut self) {
        self.total = 0.;
        self.count = 0;
    }

    fn accumulate(&mut self, learn: &Learner) -> Result<()> {
        if let Some(value) = learn.loss_func.components().get(&self.field) {
            let bs = find_bs(learn)?;
            self.total += value * bs as f64;
            self.count += bs;
        }
        Ok(())
    }

    fn value(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total / self.count as f64)
        }
    }

    fn name(&self) -> String {
        self.field.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_of_first(args: &[Tensor], kwargs: &Kwargs) -> f64 {
        let scale = kwargs.get("scale").copied().unwrap_or(1.);
        f64::from(args[0].mean(Kind::Double)) * scale
    }

    #[test]
    fn partial_binds_kwargs_and_unwraps_name() {
        let func = partial(NamedFn::new("mean_of_first", mean_of_first), [("scale", 2.)]);
        assert_eq!(func.name(), "partial(mean_of_first)");
        let args = [Tensor::of_slice(&[1.0, 3.0])];
        assert_eq!(func.score(&args, &Kwargs::new()), 4.);

        let mut overrides = Kwargs::new();
        overrides.insert("scale".to_owned(), 3.);
        assert_eq!(func.score(&args, &overrides), 6.);

        let metric = AvgMetric::new(Box::new(func), false);
        assert_eq!(metric.name(), "mean_of_first");
    }

    #[test]
    fn empty_metrics_have_no_value() {
        let metric = AvgMetric::new(Box::new(NamedFn::new("m", mean_of_first)), true);
        assert_eq!(metric.value(), None);
        assert_eq!(metric.name(), "m");
        assert_eq!(LossMetric::new("D_A_loss").value(), None);
    }
}
