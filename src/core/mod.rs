pub use tensor::*;

pub mod tensor;
