//! Error type for `rdfsub-script`.

use thiserror::Error;

use crate::access::Feature;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
  #[error("parse error on line {line}: {message}")]
  Parse { line: usize, message: String },

  #[error("type error: {0}")]
  Type(String),

  #[error("unbound variable {0}")]
  Unbound(String),

  #[error("{function} expects {expected} argument(s), got {found}")]
  Arity { function: String, expected: usize, found: usize },

  #[error("unknown function {0}")]
  UnknownFunction(String),

  /// A privileged feature was used below the level it requires.
  #[error("security violation: {feature:?} is not permitted at this access level")]
  SecurityViolation { feature: Feature },

  #[error("evaluation interrupted")]
  Interrupted,

  #[error("call depth exceeded {0}")]
  DepthExceeded(usize),

  #[error("unsupported: {0}")]
  Unsupported(&'static str),
}

pub type Result<T, E = EvalError> = std::result::Result<T, E>;
