//! The trigger predicate language.
//!
//! A trigger source is a list of s-expression function definitions. The
//! function named after the trigger IRI is the entry point; it receives the
//! deleted and inserted facts of a mutation and must return a boolean.
//!
//! ```text
//! (function <http://sub.example/triggers/open> (del ins)
//!   (match ins _ <http://ex.org/status> "open"))
//! ```
//!
//! Evaluation is synchronous and checks an [`Interrupt`] at every step, so a
//! caller running it on a worker thread can stop it from outside. Privileged
//! primitives consult an [`AccessScope`] and fail with a security violation
//! when the scope's level is too low.

mod access;
mod error;
mod eval;
mod library;
mod parse;
mod value;

pub use access::{AccessGuard, AccessLevel, AccessScope, Feature};
pub use error::{EvalError, Result};
pub use eval::{Interrupt, call};
pub use library::{Function, Library, in_namespace};
pub use parse::{Expr, parse};
pub use value::Value;
