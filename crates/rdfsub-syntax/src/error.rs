//! Error types for the rdfsub-syntax codecs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("syntax error on line {line}: {message}")]
  Syntax { line: usize, message: String },

  #[error("undeclared prefix {0:?}")]
  UnknownPrefix(String),

  #[error("unsupported construct: {0}")]
  Unsupported(String),

  #[error("xml error: {0}")]
  Xml(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
