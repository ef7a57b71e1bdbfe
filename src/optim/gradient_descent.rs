use tch::{no_grad, Tensor};

use crate::optim::optimizer::{Hypers, OptimizerAlgorithm, ParamGroup};

/// Stochastic gradient descent with optional momentum and decoupled weight decay.
pub struct GradientDescent {
    momentum: f64,
    weight_decay: f64,
    velocity: Vec<Vec<Option<Tensor>>>,
}

impl OptimizerAlgorithm for GradientDescent {
    fn default_hypers(&self) -> Hypers {
        let mut hypers = Hypers::new();
        hypers.insert("mom".to_owned(), self.momentum);
        hypers.insert("wd".to_owned(), self.weight_decay);
        hypers
    }

    fn step(&mut self, groups: &[ParamGroup]) {
        self.velocity.resize_with(groups.len(), Vec::new);
        for (group, velocities) in groups.iter().zip(self.velocity.iter_mut()) {
            let lr = group.hyper("lr", 1e-2);
            let mom = group.hyper("mom", self.momentum);
            let wd = group.hyper("wd", self.weight_decay);
            velocities.resize_with(group.params.len(), || None);

            for (parameter, velocity) in group.params.iter().zip(velocities.iter_mut()) {
                let mut parameter = parameter.lock();
                let grad = parameter.grad();
                if !grad.defined() {
                    continue;
                }
                no_grad(|| {
                    if wd != 0. {
                        let decay = &*parameter * (lr * wd);
                        *parameter -= decay;
                    }
                    let update = match velocity.take() {
                        Some(v) if mom != 0. => v * mom + &grad,
                        _ => grad.copy(),
                    };
                    *parameter -= lr * &update;
                    *velocity = Some(update);
                });
            }
        }
    }

    fn clear_state(&mut self) {
        self.velocity.clear();
    }
}

impl GradientDescent {
    pub fn new(momentum: f64, weight_decay: f64) -> GradientDescent {
        GradientDescent {
            momentum,
            weight_decay,
            velocity: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use tch::Kind;

    use crate::{
        core::{scalar, Cellable},
        optim::{trainable_params, Optimizer},
    };

    use super::*;

    #[test]
    fn gradient_descent_test() {
        let inputs = Tensor::of_slice(&[1.0, 3.0, 5.0, 4.0]).reshape(&[4, 1]);
        let labels = Tensor::of_slice(&[4.0, 10.0, 16.0, 13.0]).reshape(&[4, 1]);
        let weight = Tensor::of_slice(&[0.0]).set_requires_grad(true).cell();
        let opt = Optimizer::new(
            GradientDescent::new(0., 0.),
            trainable_params(vec![weight.clone()]),
            0.01,
        );
        let loss_at = |w: &Tensor| {
            (inputs.matmul(&w.reshape(&[1, 1])) - &labels)
                .square()
                .mean(Kind::Double)
        };
        let initial = scalar(&loss_at(&weight.lock()));
        for _ in 0..50 {
            opt.zero_grad();
            let loss = loss_at(&weight.lock());
            loss.backward();
            opt.step();
        }
        assert!(scalar(&loss_at(&weight.lock())) < initial);
        assert_eq!(opt.step_count(), 50);
    }

    #[test]
    fn single_step_without_momentum() {
        let param = Tensor::of_slice(&[1.0f64]).set_requires_grad(true).cell();
        let opt = Optimizer::new(GradientDescent::new(0.9, 0.), vec![vec![param.clone()]], 0.5);
        (&*param.lock() * 2.0).sum(Kind::Double).backward();
        opt.step();
        assert_abs_diff_eq!(scalar(&param.lock()), 0.0, epsilon = 1e-12);
    }
}
