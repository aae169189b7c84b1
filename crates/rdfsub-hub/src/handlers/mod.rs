pub mod publish;
pub mod root;
pub mod subscription;
pub mod topics;

use axum::http::{HeaderMap, header};

use crate::{admission::media_type, error::Error};

pub(super) const TEXT_TURTLE: &str = "text/turtle";
pub(super) const SPARQL_UPDATE: &str = "application/sparql-update";

/// Reject the request unless its `Content-Type` is `expected`.
pub(super) fn require_media_type(headers: &HeaderMap, expected: &str) -> Result<(), Error> {
  let found = headers
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .map(media_type)
    .unwrap_or_default();
  if found.eq_ignore_ascii_case(expected) {
    Ok(())
  } else {
    Err(Error::MalformedRequest(format!("expected Content-Type {expected}, got {found:?}")))
  }
}
