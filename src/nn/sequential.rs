use std::ops::{Deref, DerefMut};

use tch::Tensor;

use super::{append_child, Module, StateDict, Trainable};

/// A module composed by a sequential of modules.
#[derive(Debug)]
pub struct Sequential(Vec<Box<dyn Module>>);

impl Deref for Sequential {
    type Target = Vec<Box<dyn Module>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Sequential {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<Box<dyn Module>>> for Sequential {
    fn from(seq: Vec<Box<dyn Module>>) -> Self {
        Sequential(seq)
    }
}

impl FromIterator<Box<dyn Module>> for Sequential {
    fn from_iter<I: IntoIterator<Item = Box<dyn Module>>>(iter: I) -> Self {
        Sequential(iter.into_iter().collect())
    }
}

impl Trainable for Sequential {
    fn parameters(&self) -> StateDict {
        let mut state_dict = StateDict::new();
        for (i, module) in self.iter().enumerate() {
            append_child(&mut state_dict, &i.to_string(), module.parameters());
        }
        state_dict
    }
}

impl Module for Sequential {
    fn forward(&self, input: &Tensor) -> Tensor {
        let mut x = input.shallow_clone();
        for module in self.iter() {
            x = module.forward(&x)
        }
        x
    }
}

#[macro_export]
macro_rules! seq {
    ($($module:expr),* $(,)?) => {
        {
            $crate::nn::sequential::Sequential::from(vec![$(Box::new($module) as Box<dyn $crate::nn::Module>,)*])
        }
    };
}
