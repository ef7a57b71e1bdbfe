use std::sync::Arc;

use parking_lot::Mutex;
use tch::{Kind, Tensor};

/// A shared, lockable tensor. Parameters are stored this way so that a module and every
/// optimizer built over it operate on the same leaf tensor.
pub type TensorCell = Arc<Mutex<Tensor>>;

pub trait Cellable {
    fn cell(self) -> TensorCell;
}

impl Cellable for Tensor {
    fn cell(self) -> TensorCell {
        Arc::new(Mutex::new(self))
    }
}

/// Read a single-element tensor as `f64`.
pub fn scalar(tensor: &Tensor) -> f64 {
    f64::from(&tensor.to_kind(Kind::Double))
}

/// Returns `true` when the tensor carries a non-zero gradient.
pub fn has_grad(tensor: &Tensor) -> bool {
    let grad = tensor.grad();
    grad.defined() && scalar(&grad.abs().sum(Kind::Double)) > 0.
}

/// Decide if two tensors are equal.
///
/// Defaultly, the tensors are considered equal if they have the same shape and values whose MLE is less than 1e-6.
///
/// You can also explicitly specify the tolerance by passing a third argument.
#[macro_export]
macro_rules! tensor_eq {
    ($a:expr, $b:expr) => {{
        $a.size() == $b.size() && f64::from(($a - $b).square().sum(tch::Kind::Double)) < 1e-6
    }};
    ($a:expr, $b:expr, $c:expr) => {{
        $a.size() == $b.size() && f64::from(($a - $b).square().sum(tch::Kind::Double)) < $c
    }};
}

/// Assert if two tensors are equal.
///
/// Defaultly, the tensors are considered equal if they have the same shape and values whose MLE is less than 1e-6.
///
/// You can also explicitly specify the tolerance by passing a third argument.
#[macro_export]
macro_rules! assert_tensor_eq {
    ($a:expr, $b:expr) => {
        assert!($crate::tensor_eq!($a, $b));
    };
    ($a:expr, $b:expr, $c:expr) => {
        assert!($crate::tensor_eq!($a, $b, $c));
    };
}
