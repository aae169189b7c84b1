//! /publish: single-fact writes over GET, SPARQL updates over POST.

use axum::{
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
};
use rdfsub_core::{
  store::GraphStore,
  term::{GraphName, Term, Triple},
};
use rdfsub_syntax::turtle;
use tracing::error;

use crate::{
  AppState,
  coordinator::{self, Mutation, spawn_pass, spawn_update},
  error::Error,
  handlers::{SPARQL_UPDATE, require_media_type},
};

const PARAMS: [&str; 5] = ["action", "topic", "subject", "predicate", "object"];

/// Build the mutation a `GET /publish` query string describes.
///
/// Exactly the five parameters must be present. `subject`, `predicate` and
/// `topic` are IRIs; `object` is an IRI unless it is written as a quoted
/// literal or a blank node label.
pub fn parse_fact(params: &[(String, String)]) -> Result<Mutation, Error> {
  let malformed = |msg: String| Error::MalformedRequest(msg);
  if params.len() != PARAMS.len() {
    return Err(malformed(format!("expected exactly the parameters {}", PARAMS.join(", "))));
  }
  let param = |name: &str| {
    params
      .iter()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.as_str())
      .filter(|v| !v.is_empty())
      .ok_or_else(|| malformed(format!("missing parameter {name}")))
  };

  let graph = GraphName::named(param("topic")?);
  let object = param("object")?;
  let object = if object.starts_with('"') || object.starts_with("_:") {
    turtle::parse_term(object).map_err(|e| malformed(format!("object: {e}")))?
  } else {
    Term::iri(object)
  };
  let subject = Term::iri(param("subject")?);
  let predicate = Term::iri(param("predicate")?);
  let triples = vec![Triple::new(subject, predicate, object)];

  match param("action")? {
    a if a.eq_ignore_ascii_case("insert") => Ok(Mutation::Insert { graph, triples }),
    a if a.eq_ignore_ascii_case("delete") => Ok(Mutation::Delete { graph, triples }),
    other => Err(malformed(format!("unknown action {other:?}"))),
  }
}

/// GET /publish: apply the fact now, notify in the background.
///
/// Only a malformed query string is reported to the publisher. A fact the
/// store refuses is logged and still answered with 200, and no pass runs.
pub async fn get<S: GraphStore + 'static>(
  state: &AppState<S>,
  params: &[(String, String)],
) -> Result<Response, Error> {
  let mutation = parse_fact(params)?;
  match coordinator::apply(state, &mutation).await {
    Ok(changes) => {
      spawn_pass(state.clone(), changes);
    }
    Err(e) => error!(error = %e, "fact not published"),
  }
  Ok(StatusCode::OK.into_response())
}

/// POST /publish: accept a SPARQL update for background processing.
pub fn post<S: GraphStore + 'static>(
  state: &AppState<S>,
  headers: &HeaderMap,
  body: String,
) -> Result<Response, Error> {
  require_media_type(headers, SPARQL_UPDATE)?;
  spawn_update(state.clone(), Mutation::Update(body));
  Ok(StatusCode::ACCEPTED.into_response())
}

#[cfg(test)]
mod tests {
  use std::{future::Future, io};

  use rdfsub_core::{
    delta::{ChangeSet, MutationDelta},
    store::QueryResult,
    term::Literal,
  };

  use super::*;
  use crate::HubConfig;

  fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  /// A store that refuses every request.
  struct OfflineStore;

  fn offline() -> io::Error { io::Error::other("store offline") }

  impl GraphStore for OfflineStore {
    type Error = io::Error;

    fn query<'a>(
      &'a self,
      _: Option<&'a str>,
      _: &'a str,
    ) -> impl Future<Output = Result<QueryResult, io::Error>> + Send + 'a {
      std::future::ready(Err(offline()))
    }

    fn update<'a>(
      &'a self,
      _: Option<&'a str>,
      _: &'a str,
    ) -> impl Future<Output = Result<ChangeSet, io::Error>> + Send + 'a {
      std::future::ready(Err(offline()))
    }

    fn insert_data<'a>(
      &'a self,
      _: &'a GraphName,
      _: &'a [Triple],
    ) -> impl Future<Output = Result<MutationDelta, io::Error>> + Send + 'a {
      std::future::ready(Err(offline()))
    }

    fn delete_data<'a>(
      &'a self,
      _: &'a GraphName,
      _: &'a [Triple],
    ) -> impl Future<Output = Result<MutationDelta, io::Error>> + Send + 'a {
      std::future::ready(Err(offline()))
    }
  }

  #[tokio::test]
  async fn store_failure_is_logged_not_reported() {
    let config = HubConfig {
      base_url: "http://hub.test".into(),
      registry_graph: Some("http://hub.test/metadata/registry".into()),
      ..HubConfig::default()
    };
    let state = AppState::new(OfflineStore, config).unwrap();
    let fact = params(&[
      ("action", "insert"),
      ("topic", "http://hub.test/topics/t"),
      ("subject", "http://ex.test/s"),
      ("predicate", "http://ex.test/p"),
      ("object", "http://ex.test/o"),
    ]);
    let response = get(&state, &fact).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let malformed = get(&state, &params(&[("action", "insert")])).await;
    assert!(matches!(malformed, Err(Error::MalformedRequest(_))));
  }

  #[test]
  fn literal_objects_are_parsed() {
    let m = parse_fact(&params(&[
      ("action", "insert"),
      ("topic", "http://hub.test/topics/t"),
      ("subject", "http://ex.test/s"),
      ("predicate", "http://ex.test/p"),
      ("object", "\"open\"@en"),
    ]))
    .unwrap();
    let Mutation::Insert { graph, triples } = m else { panic!("expected an insert") };
    assert_eq!(graph, GraphName::named("http://hub.test/topics/t"));
    assert_eq!(triples[0].object, Literal::lang("open", "en").into());
  }

  #[test]
  fn parameter_count_is_exact() {
    let mut p = params(&[
      ("action", "delete"),
      ("topic", "http://hub.test/topics/t"),
      ("subject", "http://ex.test/s"),
      ("predicate", "http://ex.test/p"),
      ("object", "http://ex.test/o"),
    ]);
    assert!(matches!(parse_fact(&p), Ok(Mutation::Delete { .. })));
    p.push(("extra".into(), "1".into()));
    assert!(matches!(parse_fact(&p), Err(Error::MalformedRequest(_))));
    p.truncate(4);
    assert!(matches!(parse_fact(&p), Err(Error::MalformedRequest(_))));
  }

  #[test]
  fn unknown_action_is_malformed() {
    let p = params(&[
      ("action", "upsert"),
      ("topic", "http://hub.test/topics/t"),
      ("subject", "http://ex.test/s"),
      ("predicate", "http://ex.test/p"),
      ("object", "http://ex.test/o"),
    ]);
    assert!(matches!(parse_fact(&p), Err(Error::MalformedRequest(_))));
  }
}
