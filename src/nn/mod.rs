pub use act_funcs::*;
pub use conv::*;
pub use cyclegan::*;
pub use linear::*;
pub use module::*;
pub use sequential::*;

pub mod act_funcs;
pub mod conv;
pub mod cyclegan;
pub mod linear;
pub mod module;
pub mod sequential;
