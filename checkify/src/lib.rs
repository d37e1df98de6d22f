#![doc = include_str!("../../README.md")]
pub mod category;

// Compiler passes
pub mod overlay;

// path::Path is a type of dot-separated strings used to name definitions.
pub mod path;

// Evaluation
pub mod interpreter;
pub mod ssa;

pub mod definition;

// Utilities
pub mod util;

// entry point
pub mod prelude;

pub use category::lang::check;
pub use overlay::{
    ALL_CHECKS, AUTOMATIC_CHECKS, CheckSet, Checked, CheckifyError, DIV_CHECKS, Error,
    ErrorCategory, FLOAT_CHECKS, FailedCheck, INDEX_CHECKS, NAN_CHECKS, Template, USER_CHECKS,
    check_error, checkify, checkify_default,
};

////////////////////////////////////////////////////////////////////////////////
// Macros

/// Create a path from statically checked components
#[macro_export]
macro_rules! path {
    ($($lit:literal),* $(,)?) => {{
        $(
            const _: () = {
                if $crate::path::is_valid_component($lit) { () }
                else { panic!(concat!("invalid PathComponent: `", $lit, "`")) }
            };
        )*
        $crate::path::Path::from_static(&[ $( $lit ),* ])
    }};
}
