//! POST /topics: create a topic synchronously.

use axum::{
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use rdfsub_core::store::GraphStore;
use rdfsub_syntax::turtle;
use tracing::error;

use crate::{
  AppState,
  error::Error,
  handlers::{TEXT_TURTLE, require_media_type},
};

/// Replies 200 with the new topic's IRI in the `Link` header and the body.
/// Any failure after the content type check is a 500.
pub async fn handler<S: GraphStore + 'static>(
  state: &AppState<S>,
  headers: &HeaderMap,
  body: &str,
) -> Result<Response, Error> {
  require_media_type(headers, TEXT_TURTLE)?;

  let created = match turtle::parse(body) {
    Ok(description) => state.registry.create_topic(&description).await,
    Err(e) => Err(e.into()),
  };
  match created {
    Ok(topic) => Ok(
      (
        StatusCode::OK,
        [(header::LINK, format!("<{}>; rel=\"self\"", topic.id))],
        topic.id,
      )
        .into_response(),
    ),
    Err(e) => {
      error!(error = %e, "topic creation failed");
      Ok((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response())
    }
  }
}
