use cyclegan_derive::PartialBuilder;
use tch::{no_grad, Tensor};

use crate::optim::optimizer::{Hypers, OptimizerAlgorithm, ParamGroup};

struct AdamState {
    step: i32,
    m: Tensor,
    v: Tensor,
}

/// Adam with decoupled weight decay. Every group reads `lr`, `mom`, `sqr_mom`, `eps` and `wd`
/// from its own hyperparameters, so schedules can change them between steps.
#[derive(PartialBuilder)]
pub struct Adam {
    #[builder(default = "0.9")]
    mom: f64,
    #[builder(default = "0.99")]
    sqr_mom: f64,
    #[builder(default = "1e-5")]
    eps: f64,
    #[builder(default = "0.01")]
    weight_decay: f64,
    state: Vec<Vec<Option<AdamState>>>,
}

impl OptimizerAlgorithm for Adam {
    fn default_hypers(&self) -> Hypers {
        let mut hypers = Hypers::new();
        hypers.insert("mom".to_owned(), self.mom);
        hypers.insert("sqr_mom".to_owned(), self.sqr_mom);
        hypers.insert("eps".to_owned(), self.eps);
        hypers.insert("wd".to_owned(), self.weight_decay);
        hypers
    }

    fn step(&mut self, groups: &[ParamGroup]) {
        self.state.resize_with(groups.len(), Vec::new);
        for (group, states) in groups.iter().zip(self.state.iter_mut()) {
            let lr = group.hyper("lr", 1e-3);
            let mom = group.hyper("mom", self.mom);
            let sqr_mom = group.hyper("sqr_mom", self.sqr_mom);
            let eps = group.hyper("eps", self.eps);
            let wd = group.hyper("wd", self.weight_decay);
            states.resize_with(group.params.len(), || None);

            for (parameter, state) in group.params.iter().zip(states.iter_mut()) {
                let mut parameter = parameter.lock();
                let grad = parameter.grad();
                if !grad.defined() {
                    continue;
                }
                let state = state.get_or_insert_with(|| AdamState {
                    step: 0,
                    m: parameter.zeros_like(),
                    v: parameter.zeros_like(),
                });
                state.step += 1;
                no_grad(|| {
                    if wd != 0. {
                        let decay = &*parameter * (lr * wd);
                        *parameter -= decay;
                    }
                    state.m = &state.m * mom + (1. - mom) * &grad;
                    state.v = &state.v * sqr_mom + (1. - sqr_mom) * grad.square();
                    let m_hat = &state.m / (1. - mom.powi(state.step));
                    let v_hat = &state.v / (1. - sqr_mom.powi(state.step));
                    *parameter -= lr * m_hat / (v_hat.sqrt() + eps);
                });
            }
        }
    }

    fn clear_state(&mut self) {
        self.state.clear();
    }
}

impl Adam {
    pub fn new(config: AdamConfig) -> Adam {
        Adam {
            mom: config.mom,
            sqr_mom: config.sqr_mom,
            eps: config.eps,
            weight_decay: config.weight_decay,
            state: Vec::new(),
        }
    }
}
