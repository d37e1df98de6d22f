//! The error-checking overlay.
//!
//! [`checkify`] rewrites a term so that every fault of an enabled [`ErrorCategory`] is recorded
//! in an [`Error`] value threaded through the program, rather than raised. The checked term
//! returns that error as its first result. [`check_error`] turns a populated error into an `Err`
//! at the caller's boundary.
pub mod checks;
pub mod error;
pub mod pass;
pub mod template;

pub use checks::*;
pub use error::*;
pub use pass::{Checked, checked_path, checkify, checkify_default};
pub use template::Template;
