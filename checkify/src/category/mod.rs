//! The tensor IR: objects and operations ([`core`]) and functions to build terms ([`lang`]).
pub mod core;
pub mod lang;
