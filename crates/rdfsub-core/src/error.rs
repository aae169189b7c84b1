//! Error types for `rdfsub-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("resource description has no {0} property")]
  MissingProperty(&'static str),

  #[error("invalid value for {property}: {reason}")]
  InvalidProperty {
    property: &'static str,
    reason:   String,
  },

  #[error("subscription is already admitted as {0}")]
  AlreadyAdmitted(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
