pub mod config;
pub mod core;
pub mod dataset;
pub mod error;
pub mod learner;
pub mod loss;
pub mod nn;
pub mod optim;

pub use error::{Error, Result};
