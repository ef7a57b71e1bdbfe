use std::{fmt, rc::Rc, sync::Arc};

use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    core::TensorCell,
    error::{Error, Result},
};

/// Named hyperparameters of one parameter group, e.g. `lr`, `mom`, `wd`.
pub type Hypers = LinkedHashMap<String, f64>;

/// A set of parameters sharing the same hyperparameters.
#[derive(Debug)]
pub struct ParamGroup {
    pub params: Vec<TensorCell>,
    pub hypers: Hypers,
}

impl ParamGroup {
    /// Look up a hyperparameter, falling back to `default` when the group does not set it.
    pub fn hyper(&self, name: &str, default: f64) -> f64 {
        self.hypers.get(name).copied().unwrap_or(default)
    }
}

/// The update rule of an [Optimizer].
pub trait OptimizerAlgorithm {
    /// The hyperparameters every new group starts from, `lr` excluded.
    fn default_hypers(&self) -> Hypers;

    /// Update every parameter that has a gradient.
    fn step(&mut self, groups: &[ParamGroup]);

    /// Forget accumulated state such as moment estimates.
    fn clear_state(&mut self);
}

struct OptimizerData {
    algorithm: Box<dyn OptimizerAlgorithm>,
    groups: Vec<ParamGroup>,
    step_count: usize,
}

/// A shared handle on an optimizer. Clones step the same parameters with the same state, so
/// a learner and a callback can hold the same optimizer.
#[derive(Clone)]
pub struct Optimizer {
    arc: Arc<Mutex<OptimizerData>>,
}

impl fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.arc.lock();
        f.debug_struct("Optimizer")
            .field("groups", &data.groups.len())
            .field("hypers", &data.groups.iter().map(|g| &g.hypers).collect_vec())
            .field("step_count", &data.step_count)
            .finish()
    }
}

impl Optimizer {
    pub fn new<T: OptimizerAlgorithm + 'static>(
        algorithm: T,
        groups: Vec<Vec<TensorCell>>,
        lr: f64,
    ) -> Optimizer {
        let groups = groups
            .into_iter()
            .map(|params| {
                let mut hypers = Hypers::new();
                hypers.insert("lr".to_owned(), lr);
                hypers.extend(algorithm.default_hypers());
                ParamGroup { params, hypers }
            })
            .collect();
        Optimizer {
            arc: Arc::new(Mutex::new(OptimizerData {
                algorithm: Box::new(algorithm),
                groups,
                step_count: 0,
            })),
        }
    }

    /// Returns `true` if both handles point at the same optimizer.
    pub fn same(&self, other: &Optimizer) -> bool {
        Arc::ptr_eq(&self.arc, &other.arc)
    }

    pub fn zero_grad(&self) {
        for group in self.arc.lock().groups.iter() {
            for param in group.params.iter() {
                param.lock().zero_grad();
            }
        }
    }

    pub fn step(&self) {
        let mut data = self.arc.lock();
        let OptimizerData {
            algorithm, groups, ..
        } = &mut *data;
        algorithm.step(groups);
        data.step_count += 1;
    }

    /// How many times [Optimizer::step] has been called.
    pub fn step_count(&self) -> usize {
        self.arc.lock().step_count
    }

    pub fn num_groups(&self) -> usize {
        self.arc.lock().groups.len()
    }

    pub fn num_params(&self) -> usize {
        self.arc.lock().groups.iter().map(|g| g.params.len()).sum()
    }

    /// A copy of the hyperparameters of every group.
    pub fn hypers(&self) -> Vec<Hypers> {
        self.arc
            .lock()
            .groups
            .iter()
            .map(|group| group.hypers.clone())
            .collect()
    }

    /// Overwrite the hyperparameters of every group. A single source group is applied to all
    /// groups; otherwise the group counts must match.
    pub fn set_hypers(&self, hypers: Vec<Hypers>) -> Result<()> {
        let mut data = self.arc.lock();
        let target_groups = data.groups.len();
        match hypers.len() {
            1 => {
                for group in data.groups.iter_mut() {
                    group.hypers = hypers[0].clone();
                }
            }
            n if n == target_groups => {
                for (group, hypers) in data.groups.iter_mut().zip_eq(hypers) {
                    group.hypers = hypers;
                }
            }
            source_groups => {
                return Err(Error::HyperGroups {
                    source_groups,
                    target_groups,
                })
            }
        }
        debug!(groups = target_groups, "resynced optimizer hyperparameters");
        Ok(())
    }

    /// Copy all hyperparameters from another optimizer.
    pub fn sync_hypers_from(&self, source: &Optimizer) -> Result<()> {
        if self.same(source) {
            return Ok(());
        }
        self.set_hypers(source.hypers())
    }

    /// Set `name` to `value` on every group.
    pub fn set_hyper(&self, name: &str, value: f64) {
        for group in self.arc.lock().groups.iter_mut() {
            group.hypers.insert(name.to_owned(), value);
        }
    }

    /// Set `name` group by group. A single value is applied to all groups.
    pub fn set_hyper_groups(&self, name: &str, values: &[f64]) -> Result<()> {
        let mut data = self.arc.lock();
        let target_groups = data.groups.len();
        if values.len() != 1 && values.len() != target_groups {
            return Err(Error::HyperGroups {
                source_groups: values.len(),
                target_groups,
            });
        }
        for (i, group) in data.groups.iter_mut().enumerate() {
            let value = if values.len() == 1 { values[0] } else { values[i] };
            group.hypers.insert(name.to_owned(), value);
        }
        Ok(())
    }

    /// The value of `name` in every group that sets it.
    pub fn hyper(&self, name: &str) -> Vec<f64> {
        self.arc
            .lock()
            .groups
            .iter()
            .filter_map(|group| group.hypers.get(name).copied())
            .collect()
    }

    pub fn clear_state(&self) {
        self.arc.lock().algorithm.clear_state();
    }
}

/// Builds an optimizer over parameter groups at a learning rate, the way a learner needs it.
pub type OptimizerFn = Rc<dyn Fn(Vec<Vec<TensorCell>>, f64) -> Optimizer>;

/// Splits a flat parameter list into parameter groups.
pub type Splitter = fn(Vec<TensorCell>) -> Vec<Vec<TensorCell>>;

/// The default [Splitter]: every parameter in a single group.
pub fn trainable_params(params: Vec<TensorCell>) -> Vec<Vec<TensorCell>> {
    vec![params]
}

#[cfg(test)]
mod tests {
    use tch::Tensor;

    use crate::{core::Cellable, optim::GradientDescent};

    use super::*;

    fn params(n: usize) -> Vec<TensorCell> {
        (0..n)
            .map(|_| Tensor::of_slice(&[1.0f32]).set_requires_grad(true).cell())
            .collect()
    }

    fn two_groups(params: Vec<TensorCell>) -> Vec<Vec<TensorCell>> {
        let mut params = params;
        let tail = params.split_off(1);
        vec![params, tail]
    }

    #[test]
    fn groups_start_with_lr_and_defaults() {
        let opt = Optimizer::new(GradientDescent::new(0., 0.), two_groups(params(3)), 0.1);
        assert_eq!(opt.num_groups(), 2);
        assert_eq!(opt.num_params(), 3);
        assert_eq!(opt.hyper("lr"), vec![0.1, 0.1]);
        assert_eq!(opt.hyper("mom"), vec![0., 0.]);
    }

    #[test]
    fn set_hypers_broadcasts_a_single_group() {
        let source = Optimizer::new(GradientDescent::new(0., 0.), trainable_params(params(1)), 0.5);
        let target = Optimizer::new(GradientDescent::new(0., 0.), two_groups(params(2)), 0.1);
        target.sync_hypers_from(&source).unwrap();
        assert_eq!(target.hyper("lr"), vec![0.5, 0.5]);
    }

    #[test]
    fn set_hypers_rejects_mismatched_groups() {
        let source = Optimizer::new(GradientDescent::new(0., 0.), two_groups(params(2)), 0.5);
        let target = Optimizer::new(
            GradientDescent::new(0., 0.),
            vec![params(1), params(1), params(1)],
            0.1,
        );
        assert!(matches!(
            target.sync_hypers_from(&source),
            Err(Error::HyperGroups {
                source_groups: 2,
                target_groups: 3
            })
        ));
    }

    #[test]
    fn clones_share_state() {
        let opt = Optimizer::new(GradientDescent::new(0., 0.), trainable_params(params(1)), 0.1);
        let other = opt.clone();
        other.step();
        other.set_hyper("lr", 0.01);
        assert!(opt.same(&other));
        assert_eq!(opt.step_count(), 1);
        assert_eq!(opt.hyper("lr"), vec![0.01]);
    }
}
