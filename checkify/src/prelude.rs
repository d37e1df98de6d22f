pub use crate::category::core::{Dtype, Literal, Object, Shape};
pub use crate::category::lang::*;
pub use crate::definition::{Environment, FnModule, Module};
pub use crate::interpreter::{self, Backend, Interpreter, Value, tensor};
pub use crate::overlay::*;

pub use crate::path;
pub use crate::util::build_typed;
