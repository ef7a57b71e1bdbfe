pub use adam::*;
pub use gradient_descent::*;
pub use optimizer::*;
pub use schedule::*;

pub mod adam;
pub mod gradient_descent;
pub mod optimizer;
pub mod schedule;

use std::rc::Rc;

/// An [OptimizerFn] building a fresh [Adam] from `builder` for every optimizer.
pub fn adam_fn(builder: AdamBuilder) -> OptimizerFn {
    Rc::new(move |groups, lr| Optimizer::new(builder.clone().build(), groups, lr))
}

/// An [OptimizerFn] building [GradientDescent] optimizers.
pub fn sgd_fn(momentum: f64, weight_decay: f64) -> OptimizerFn {
    Rc::new(move |groups, lr| {
        Optimizer::new(GradientDescent::new(momentum, weight_decay), groups, lr)
    })
}
