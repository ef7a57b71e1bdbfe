use std::sync::Arc;

use tch::Tensor;
use tracing::debug;

use crate::{
    core::TensorCell,
    error::{check_arity, Result},
};

use super::{append_child, Module, ModuleMode, Net, StateDict, Trainable};

/// Which pair of sub-networks receives gradients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Generators,
    Discriminators,
}

/// The four images produced by one forward pass of [CycleGan].
#[derive(Debug)]
pub struct CycleGanOutput {
    /// `G_A(real_b)`, a translation into domain A.
    pub fake_a: Tensor,
    /// `G_B(real_a)`, a translation into domain B.
    pub fake_b: Tensor,
    /// `G_A(real_a)`, which should stay close to `real_a`.
    pub idt_a: Tensor,
    /// `G_B(real_b)`, which should stay close to `real_b`.
    pub idt_b: Tensor,
}

impl CycleGanOutput {
    /// The predictions in reporting order: `fake_a, fake_b, idt_a, idt_b`.
    pub fn to_vec(&self) -> Vec<Tensor> {
        vec![
            self.fake_a.shallow_clone(),
            self.fake_b.shallow_clone(),
            self.idt_a.shallow_clone(),
            self.idt_b.shallow_clone(),
        ]
    }

    /// Both translations, cut off from the generators' graph.
    pub fn detached_fakes(&self) -> (Tensor, Tensor) {
        (self.fake_a.detach(), self.fake_b.detach())
    }
}

/// Shared handles on the four sub-networks of a [CycleGan].
#[derive(Debug, Clone)]
pub struct SubNetworks {
    pub g_a: Net,
    pub g_b: Net,
    pub d_a: Net,
    pub d_b: Net,
}

impl SubNetworks {
    pub fn zero_grad_generators(&self) {
        self.g_a.zero_grad();
        self.g_b.zero_grad();
    }

    pub fn zero_grad_discriminators(&self) {
        self.d_a.zero_grad();
        self.d_b.zero_grad();
    }

    pub fn generator_parameters(&self) -> Vec<TensorCell> {
        super::concat_parameters(&[&self.g_a as &dyn Trainable, &self.g_b])
    }

    pub fn discriminator_parameters(&self) -> Vec<TensorCell> {
        super::concat_parameters(&[&self.d_a as &dyn Trainable, &self.d_b])
    }

    /// Make one pair trainable and freeze the other.
    pub fn set_phase(&self, phase: Phase) {
        let (trained, frozen) = match phase {
            Phase::Generators => ([&self.g_a, &self.g_b], [&self.d_a, &self.d_b]),
            Phase::Discriminators => ([&self.d_a, &self.d_b], [&self.g_a, &self.g_b]),
        };
        frozen.iter().for_each(|net| net.freeze());
        trained.iter().for_each(|net| net.unfreeze());
        debug!(?phase, "switched trainable sub-networks");
    }

    /// The phase the trainability flags currently describe, if they describe one.
    pub fn phase(&self) -> Option<Phase> {
        let frozen = |net: &Net| net.training_parameters().is_empty();
        let generators = self.g_a.is_trainable() && self.g_b.is_trainable();
        let discriminators = self.d_a.is_trainable() && self.d_b.is_trainable();
        if generators && frozen(&self.d_a) && frozen(&self.d_b) {
            Some(Phase::Generators)
        } else if discriminators && frozen(&self.g_a) && frozen(&self.g_b) {
            Some(Phase::Discriminators)
        } else {
            None
        }
    }
}

/// The combined CycleGAN model: two generators translating between domains A and B, and one
/// discriminator per domain.
///
/// `G_A` produces domain-A images from domain-B inputs and `G_B` does the reverse. `D_A`
/// tells real domain-A images from generated ones, `D_B` does the same for domain B.
#[derive(Debug)]
pub struct CycleGan {
    nets: SubNetworks,
    mode: ModuleMode,
}

impl CycleGan {
    pub fn new<GA, GB, DA, DB>(g_a: GA, g_b: GB, d_a: DA, d_b: DB) -> CycleGan
    where
        GA: Module + 'static,
        GB: Module + 'static,
        DA: Module + 'static,
        DB: Module + 'static,
    {
        CycleGan::from_nets(Arc::new(g_a), Arc::new(g_b), Arc::new(d_a), Arc::new(d_b))
    }

    pub fn from_nets(g_a: Net, g_b: Net, d_a: Net, d_b: Net) -> CycleGan {
        CycleGan {
            nets: SubNetworks { g_a, g_b, d_a, d_b },
            mode: ModuleMode::Train,
        }
    }

    pub fn g_a(&self) -> &Net {
        &self.nets.g_a
    }

    pub fn g_b(&self) -> &Net {
        &self.nets.g_b
    }

    pub fn d_a(&self) -> &Net {
        &self.nets.d_a
    }

    pub fn d_b(&self) -> &Net {
        &self.nets.d_b
    }

    /// Clones of the handles on all four sub-networks.
    pub fn nets(&self) -> SubNetworks {
        self.nets.clone()
    }

    pub fn set_phase(&self, phase: Phase) {
        self.nets.set_phase(phase)
    }

    pub fn train(&mut self) {
        self.mode = ModuleMode::Train;
    }

    pub fn eval(&mut self) {
        self.mode = ModuleMode::Eval;
    }

    pub fn is_training(&self) -> bool {
        self.mode == ModuleMode::Train
    }

    pub fn forward(&self, real_a: &Tensor, real_b: &Tensor) -> CycleGanOutput {
        CycleGanOutput {
            fake_a: self.nets.g_a.forward(real_b),
            fake_b: self.nets.g_b.forward(real_a),
            idt_a: self.nets.g_a.forward(real_a),
            idt_b: self.nets.g_b.forward(real_b),
        }
    }

    /// Forward over a packed `[real_a, real_b]` batch.
    pub fn forward_batch(&self, xb: &[Tensor]) -> Result<CycleGanOutput> {
        check_arity("model input", xb, 2)?;
        Ok(self.forward(&xb[0], &xb[1]))
    }
}

impl Trainable for CycleGan {
    fn parameters(&self) -> StateDict {
        let mut state_dict = StateDict::new();
        append_child(&mut state_dict, "G_A", self.nets.g_a.parameters());
        append_child(&mut state_dict, "G_B", self.nets.g_b.parameters());
        append_child(&mut state_dict, "D_A", self.nets.d_a.parameters());
        append_child(&mut state_dict, "D_B", self.nets.d_b.parameters());
        state_dict
    }
}

#[cfg(test)]
mod tests {
    use tch::{Device, Kind};

    use crate::nn::conv2d;

    use super::*;

    fn model() -> CycleGan {
        CycleGan::new(conv2d(3, 3, 1), conv2d(3, 3, 1), conv2d(3, 1, 1), conv2d(3, 1, 1))
    }

    #[test]
    fn set_phase_is_mutually_exclusive() {
        let model = model();
        model.set_phase(Phase::Generators);
        assert!(model.g_a().is_trainable() && model.g_b().is_trainable());
        assert!(model.d_a().training_parameters().is_empty());
        assert!(model.d_b().training_parameters().is_empty());
        assert_eq!(model.nets().phase(), Some(Phase::Generators));

        model.set_phase(Phase::Discriminators);
        assert!(model.g_a().training_parameters().is_empty());
        assert!(model.d_a().is_trainable() && model.d_b().is_trainable());
        assert_eq!(model.nets().phase(), Some(Phase::Discriminators));
    }

    #[test]
    fn forward_routes_domains_through_the_right_generator() {
        let model = model();
        let real_a = Tensor::rand(&[2, 3, 4, 4], (Kind::Float, Device::Cpu));
        let real_b = Tensor::rand(&[2, 3, 4, 4], (Kind::Float, Device::Cpu));
        let output = model.forward(&real_a, &real_b);
        crate::assert_tensor_eq!(&output.fake_a, &model.g_a().forward(&real_b));
        crate::assert_tensor_eq!(&output.fake_b, &model.g_b().forward(&real_a));
        crate::assert_tensor_eq!(&output.idt_a, &model.g_a().forward(&real_a));
        crate::assert_tensor_eq!(&output.idt_b, &model.g_b().forward(&real_b));
    }

    #[test]
    fn forward_batch_requires_a_pair() {
        let model = model();
        let real_a = Tensor::rand(&[1, 3, 2, 2], (Kind::Float, Device::Cpu));
        assert!(model.forward_batch(&[real_a]).is_err());
    }

    #[test]
    fn parameters_are_namespaced() {
        let model = model();
        assert_eq!(model.parameter_size(), 8);
        assert!(model.parameters().contains_key("D_B.weight"));
    }
}
