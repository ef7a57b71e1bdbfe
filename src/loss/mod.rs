pub use adversarial::*;
pub use cyclegan_loss::*;

pub mod adversarial;
pub mod cyclegan_loss;
