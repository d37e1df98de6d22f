//! Reference interpreter for terms, including terms instrumented by
//! [`crate::overlay::checkify`].
pub mod backend;
mod guard;
mod run;
mod tensor_op;
mod types;
mod util;

pub use backend::*;
pub use run::Interpreter;
pub use types::*;
