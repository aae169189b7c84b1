//! Error types and axum `IntoResponse` implementation.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::sandbox::SandboxError;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing fields, unparsable body, or the wrong content type.
  #[error("malformed request: {0}")]
  MalformedRequest(String),

  #[error("callback validation failed: {0}")]
  UnreachableCallback(String),

  #[error("invalid trigger source: {0}")]
  InvalidTriggerSource(String),

  #[error("trigger evaluation failed: {0}")]
  TriggerEvaluationFailure(String),

  #[error("sandbox: {0}")]
  Sandbox(#[from] SandboxError),

  #[error("graph store error: {0}")]
  GraphStore(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("syntax error: {0}")]
  Syntax(#[from] rdfsub_syntax::Error),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::GraphStore(Box::new(e))
  }
}

impl From<rdfsub_core::Error> for Error {
  fn from(e: rdfsub_core::Error) -> Self { Self::MalformedRequest(e.to_string()) }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::MalformedRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
      Error::Syntax(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
      other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
