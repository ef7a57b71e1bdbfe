use std::{fmt::Debug, sync::Arc};

use linked_hash_map::LinkedHashMap;
use tch::{no_grad, Tensor};

use crate::core::TensorCell;

/// A `StateDict` is a collection of named tensors. It uses [LinkedHashMap] to preserve the insertion order of the tensors, which optimizers rely on to pair parameters with their state across steps.
pub type StateDict = LinkedHashMap<String, TensorCell>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleMode {
    Train,
    Eval,
}

/// A trait for anything that has trainable parameters.
pub trait Trainable: Debug {
    /// Defines the trainable parameters of the module, including those of child modules.
    ///
    /// By default, this returns an empty map. If your module has trainable parameters, you should override this method.
    fn parameters(&self) -> StateDict {
        LinkedHashMap::new()
    }

    /// Returns the number of parameter tensors of the module.
    fn parameter_size(&self) -> usize {
        self.parameters().len()
    }

    /// Returns all trainable parameters that are not frozen.
    fn training_parameters(&self) -> Vec<TensorCell> {
        self.parameters()
            .into_iter()
            .map(|(_, parameter)| parameter)
            .filter(|tensor| tensor.lock().requires_grad())
            .collect()
    }

    /// Returns every parameter, frozen or not, in a stable order.
    fn parameter_list(&self) -> Vec<TensorCell> {
        self.parameters().into_iter().map(|(_, p)| p).collect()
    }

    /// Set whether gradients are tracked for every parameter of the module.
    fn set_trainable(&self, trainable: bool) {
        for tensor in self.parameters().values() {
            let mut tensor = tensor.lock();
            no_grad(|| {
                *tensor = tensor.set_requires_grad(trainable);
            });
        }
    }

    /// Freeze the trainable parameters of the module.
    fn freeze(&self) {
        self.set_trainable(false);
    }

    /// Unfreeze the trainable parameters of the module.
    fn unfreeze(&self) {
        self.set_trainable(true);
    }

    /// Returns `true` if every parameter of the module tracks gradients.
    fn is_trainable(&self) -> bool {
        self.parameters()
            .values()
            .all(|tensor| tensor.lock().requires_grad())
    }

    /// Clear the gradients of the trainable parameters of the module.
    fn zero_grad(&self) {
        self.parameters().values().for_each(|param| {
            let mut param = param.lock();
            param.zero_grad();
        });
    }

    /// Initialize the trainable parameters of the module, with a certain distribution from `tch::nn::Init`.
    fn init(&self, init: tch::nn::Init) {
        no_grad(|| {
            for parameter in self.parameters().values() {
                parameter.lock().init(init);
            }
        });
    }
}

/// A module is a neural network layer, which can be seen as a function from `Tensor` to `Tensor`, with some trainable parameters.
pub trait Module: Trainable {
    /// The forward function for Module.
    fn forward(&self, input: &Tensor) -> Tensor;
}

/// A shared handle on a module. Generators and discriminators are held this way so the model,
/// the loss and the training callbacks all see the same network.
pub type Net = Arc<dyn Module>;

impl<T: Trainable + ?Sized> Trainable for Arc<T> {
    fn parameters(&self) -> StateDict {
        (**self).parameters()
    }
}

impl<T: Module + ?Sized> Module for Arc<T> {
    fn forward(&self, input: &Tensor) -> Tensor {
        (**self).forward(input)
    }
}

impl<T: Trainable + ?Sized> Trainable for Box<T> {
    fn parameters(&self) -> StateDict {
        (**self).parameters()
    }
}

impl<T: Module + ?Sized> Module for Box<T> {
    fn forward(&self, input: &Tensor) -> Tensor {
        (**self).forward(input)
    }
}

/// Prefix every key of `child` with `name.` and append it to `parent`.
pub fn append_child(parent: &mut StateDict, name: &str, child: StateDict) {
    for (child_name, parameter) in child {
        parent.insert(format!("{}.{}", name, child_name), parameter);
    }
}

/// Concatenate the parameters of several modules, in order.
pub fn concat_parameters(modules: &[&dyn Trainable]) -> Vec<TensorCell> {
    modules
        .iter()
        .flat_map(|module| module.parameter_list())
        .collect()
}
