//! POST /subscription: accept a description and admit it in the background.

use axum::{
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
};
use rdfsub_core::store::GraphStore;
use tracing::debug;

use crate::{
  AppState,
  admission::spawn_admission,
  error::Error,
  handlers::{TEXT_TURTLE, require_media_type},
};

pub fn handler<S: GraphStore + 'static>(
  state: &AppState<S>,
  headers: &HeaderMap,
  body: String,
) -> Result<Response, Error> {
  require_media_type(headers, TEXT_TURTLE)?;
  debug!(bytes = body.len(), "subscription request accepted");
  spawn_admission(state.clone(), body);
  Ok(StatusCode::ACCEPTED.into_response())
}
