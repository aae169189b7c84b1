//! The rdfsub hub: a capability-secured publish/subscribe service over a
//! graph store.
//!
//! Exposes an axum [`Router`] for the hub's HTTP surface, backed by any
//! [`GraphStore`]. Subscriptions are admitted in the background, every
//! mutation re-evaluates every registered trigger in a sandbox, and fired
//! triggers have their query results POSTed to the subscriber's callback.

pub mod admission;
pub mod capability;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod sandbox;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  extract::{DefaultBodyLimit, Query, State},
  http::HeaderMap,
  response::Response,
  routing::{get, post},
};
use rdfsub_core::store::GraphStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use capability::{CapabilityUriGenerator, Container};
use dispatcher::Dispatcher;
use handlers::{publish, root, subscription, topics};
use registry::Registry;
use sandbox::SandboxRuntime;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `RDFSUB_*`
/// environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HubConfig {
  pub host:               String,
  pub port:               u16,
  /// Base of every capability URI the hub allocates.
  pub base_url:           String,
  pub store_path:         PathBuf,
  /// Registry graph IRI. A fresh `/metadata/` URI is allocated when unset.
  pub registry_graph:     Option<String>,
  pub trigger_timeout_ms: u64,
  pub sandbox_workers:    usize,
  pub http_timeout_ms:    u64,
  pub max_body_bytes:     usize,
}

impl Default for HubConfig {
  fn default() -> Self {
    Self {
      host:               "0.0.0.0".into(),
      port:               8090,
      base_url:           "http://localhost:8090".into(),
      store_path:         PathBuf::from("rdfsub.db"),
      registry_graph:     None,
      trigger_timeout_ms: 1000,
      sandbox_workers:    16,
      http_timeout_ms:    5000,
      max_body_bytes:     1024 * 1024,
    }
  }
}

impl HubConfig {
  pub fn trigger_timeout(&self) -> Duration { Duration::from_millis(self.trigger_timeout_ms) }

  pub fn http_timeout(&self) -> Duration { Duration::from_millis(self.http_timeout_ms) }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers and background tasks.
pub struct AppState<S: GraphStore> {
  pub store:      Arc<S>,
  pub config:     Arc<HubConfig>,
  pub registry:   Arc<Registry<S>>,
  pub sandbox:    SandboxRuntime,
  pub dispatcher: Dispatcher,
  /// Client for callback and trigger validation requests.
  pub http:       reqwest::Client,
}

impl<S: GraphStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      config:     Arc::clone(&self.config),
      registry:   Arc::clone(&self.registry),
      sandbox:    self.sandbox.clone(),
      dispatcher: self.dispatcher.clone(),
      http:       self.http.clone(),
    }
  }
}

impl<S: GraphStore> AppState<S> {
  pub fn new(store: S, config: HubConfig) -> Result<Self, reqwest::Error> {
    let http = reqwest::Client::builder().timeout(config.http_timeout()).build()?;
    let store = Arc::new(store);

    let generator = CapabilityUriGenerator::new(&config.base_url);
    let registry_graph = match &config.registry_graph {
      Some(graph) => graph.clone(),
      None => generator.generate(Container::Metadata.path()),
    };
    info!(graph = %registry_graph, "registry graph");

    Ok(Self {
      registry: Arc::new(Registry::new(Arc::clone(&store), registry_graph, generator)),
      sandbox: SandboxRuntime::new(config.sandbox_workers, config.trigger_timeout()),
      dispatcher: Dispatcher::new(http.clone()),
      http,
      store,
      config: Arc::new(config),
    })
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the hub's axum [`Router`].
pub fn router<S: GraphStore + 'static>(state: AppState<S>) -> Router {
  let body_limit = state.config.max_body_bytes;
  Router::new()
    .route("/",             get(root::handler))
    .route("/subscription", post(subscription_handler::<S>))
    .route("/topics",       post(topics_handler::<S>))
    .route("/publish",      get(publish_get_handler::<S>).post(publish_post_handler::<S>))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn subscription_handler<S: GraphStore + 'static>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  body: String,
) -> Result<Response, Error> {
  subscription::handler(&state, &headers, body)
}

async fn topics_handler<S: GraphStore + 'static>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  body: String,
) -> Result<Response, Error> {
  topics::handler(&state, &headers, &body).await
}

async fn publish_get_handler<S: GraphStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, Error> {
  publish::get(&state, &params).await
}

async fn publish_post_handler<S: GraphStore + 'static>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  body: String,
) -> Result<Response, Error> {
  publish::post(&state, &headers, body)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
  use std::collections::HashSet;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use rdfsub_core::{
    store::QueryResult,
    term::{GraphName, Term, Triple},
    vocab::US_SUBSCRIPTION,
  };
  use rdfsub_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
  };

  use super::*;
  use crate::{
    admission::{AdmissionOutcome, admit, spawn_admission},
    coordinator::{Mutation, PassReport, spawn_update},
    dispatcher::{SPARQL_RESULTS_XML, TEXT_TURTLE},
  };

  const TOPIC: &str = "http://hub.test/topics/tickets";

  pub(crate) async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let config = HubConfig {
      base_url: "http://hub.test".into(),
      registry_graph: Some("http://hub.test/metadata/registry".into()),
      trigger_timeout_ms: 200,
      http_timeout_ms: 2000,
      ..HubConfig::default()
    };
    AppState::new(store, config).unwrap()
  }

  async fn oneshot_raw(
    state: AppState<SqliteStore>,
    method: &str,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
  ) -> (StatusCode, HeaderMap, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(ct) = content_type {
      builder = builder.header(header::CONTENT_TYPE, ct);
    }
    let req = builder.body(Body::from(body.to_owned())).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
  }

  /// A subscriber whose callback accepts validation requests and
  /// notifications, serving a trigger whose entry function evaluates
  /// `trigger_body`.
  async fn subscriber(trigger_body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/cb"))
      .respond_with(ResponseTemplate::new(204))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/cb"))
      .respond_with(ResponseTemplate::new(200))
      .mount(&server)
      .await;
    let source = format!("(function <{}/trigger> (del ins) {trigger_body})", server.uri());
    Mock::given(method("GET"))
      .and(path("/trigger"))
      .respond_with(ResponseTemplate::new(200).set_body_raw(source, "application/sparql-query"))
      .mount(&server)
      .await;
    server
  }

  fn description(server: &MockServer, query: &str) -> String {
    format!(
      r#"<> us:callback <{0}/cb> ; us:trigger <{0}/trigger> ; us:query "{1}" ."#,
      server.uri(),
      query
    )
  }

  const CONSTRUCT_TOPIC: &str =
    "CONSTRUCT { ?s ?p ?o } WHERE { GRAPH <http://hub.test/topics/tickets> { ?s ?p ?o } }";
  const SELECT_TOPIC: &str =
    "SELECT ?s WHERE { GRAPH <http://hub.test/topics/tickets> { ?s ?p ?o } }";

  async fn subscribe(state: &AppState<SqliteStore>, server: &MockServer, query: &str) -> String {
    match admit(state, &description(server, query)).await {
      AdmissionOutcome::Admitted(sub) => sub.id.unwrap(),
      AdmissionOutcome::Rejected(e) => panic!("subscription rejected: {e}"),
    }
  }

  fn fact(n: u32) -> Triple {
    Triple::new(
      Term::iri(format!("http://ex.test/ticket/{n}")),
      Term::iri("http://ex.test/status"),
      Term::iri("http://ex.test/open"),
    )
  }

  async fn publish(state: &AppState<SqliteStore>, triple: Triple) -> PassReport {
    let mutation = Mutation::Insert { graph: GraphName::named(TOPIC), triples: vec![triple] };
    spawn_update(state.clone(), mutation).await.unwrap().unwrap()
  }

  async fn notifications(server: &MockServer) -> Vec<wiremock::Request> {
    server
      .received_requests()
      .await
      .unwrap()
      .into_iter()
      .filter(|r| r.method.as_str() == "POST")
      .collect()
  }

  // ── HTTP surface ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn root_answers_with_the_banner() {
    let (status, _, body) = oneshot_raw(make_state().await, "GET", "/", None, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, root::BANNER);
  }

  #[tokio::test]
  async fn topic_creation_reports_its_capability_uri() {
    let state = make_state().await;
    let (status, headers, body) = oneshot_raw(
      state.clone(),
      "POST",
      "/topics",
      Some("text/turtle"),
      r#"<> dcterms:title "Tickets" ."#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("http://hub.test/topics/"));
    let link = headers.get(header::LINK).unwrap().to_str().unwrap();
    assert!(link.starts_with(&format!("<{body}>")));
    assert!(state.registry.resources(rdfsub_core::vocab::US_TOPIC).await.unwrap().contains(&body));
  }

  #[tokio::test]
  async fn wrong_content_types_are_bad_requests() {
    let state = make_state().await;
    for uri in ["/topics", "/subscription", "/publish"] {
      let (status, _, _) = oneshot_raw(state.clone(), "POST", uri, Some("text/plain"), "x").await;
      assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
  }

  #[tokio::test]
  async fn unparsable_topic_description_is_a_server_error() {
    let (status, _, _) =
      oneshot_raw(make_state().await, "POST", "/topics", Some("text/turtle"), "<> <unclosed").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[tokio::test]
  async fn subscription_and_update_are_accepted_asynchronously() {
    let state = make_state().await;
    let (status, _, _) =
      oneshot_raw(state.clone(), "POST", "/subscription", Some("text/turtle"), "garbage").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _, _) = oneshot_raw(
      state,
      "POST",
      "/publish",
      Some("application/sparql-update"),
      "INSERT DATA { GRAPH <http://hub.test/topics/tickets> { <http://ex.test/a> <http://ex.test/b> <http://ex.test/c> } }",
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
  }

  #[tokio::test]
  async fn get_publish_writes_one_fact() {
    let state = make_state().await;
    let uri = "/publish?action=insert&topic=http%3A%2F%2Fhub.test%2Ftopics%2Ftickets\
               &subject=http%3A%2F%2Fex.test%2Fa&predicate=http%3A%2F%2Fex.test%2Fb\
               &object=%22open%22";
    let (status, _, _) = oneshot_raw(state.clone(), "GET", uri, None, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.store.count(&GraphName::named(TOPIC)).await.unwrap(), 1);

    let (status, _, _) =
      oneshot_raw(state, "GET", "/publish?action=insert&topic=x", None, "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Subscription lifecycle ────────────────────────────────────────────────

  #[tokio::test]
  async fn fired_trigger_notifies_exactly_once_with_a_self_link() {
    let state = make_state().await;
    let server = subscriber("true").await;
    let id = subscribe(&state, &server, CONSTRUCT_TOPIC).await;

    let report = publish(&state, fact(1)).await;
    assert_eq!(report, PassReport { evaluated: 1, triggered: 1, failed: 0, delivered: 1 });

    let posts = notifications(&server).await;
    assert_eq!(posts.len(), 1);
    let link = posts[0].headers.get("link").unwrap().to_str().unwrap();
    assert_eq!(link, format!("<{id}>; rel=\"self\""));
    let ct = posts[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert_eq!(ct, TEXT_TURTLE);
    assert!(String::from_utf8_lossy(&posts[0].body).contains("http://ex.test/ticket/1"));
  }

  #[tokio::test]
  async fn tabular_results_are_sent_as_sparql_results_xml() {
    let state = make_state().await;
    let server = subscriber("true").await;
    subscribe(&state, &server, SELECT_TOPIC).await;
    publish(&state, fact(1)).await;

    let posts = notifications(&server).await;
    let ct = posts[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert_eq!(ct, SPARQL_RESULTS_XML);
  }

  #[tokio::test]
  async fn false_trigger_is_quiet_on_every_write() {
    let state = make_state().await;
    let server = subscriber("(not (empty del))").await;
    subscribe(&state, &server, CONSTRUCT_TOPIC).await;

    let report = publish(&state, fact(1)).await;
    assert_eq!(report, PassReport { evaluated: 1, ..PassReport::default() });
    let again = publish(&state, fact(1)).await;
    assert_eq!(again, PassReport { evaluated: 1, ..PassReport::default() });
    assert!(notifications(&server).await.is_empty());
  }

  #[tokio::test]
  async fn unchanged_write_still_offers_the_requested_fact() {
    let state = make_state().await;
    let server = subscriber(r#"(match ins <http://ex.test/ticket/1> _ _)"#).await;
    subscribe(&state, &server, CONSTRUCT_TOPIC).await;

    let first = publish(&state, fact(1)).await;
    assert_eq!(first.delivered, 1);
    let again = publish(&state, fact(1)).await;
    assert_eq!(again, PassReport { evaluated: 1, triggered: 1, failed: 0, delivered: 1 });
    assert_eq!(notifications(&server).await.len(), 2);
    assert_eq!(state.store.count(&GraphName::named(TOPIC)).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn nested_trigger_iris_fire_independently() {
    let state = make_state().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/cb"))
      .respond_with(ResponseTemplate::new(204))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/cb"))
      .respond_with(ResponseTemplate::new(200))
      .mount(&server)
      .await;
    for trigger_path in ["/a", "/a/t"] {
      let source = format!("(function <{}{trigger_path}> (del ins) true)", server.uri());
      Mock::given(method("GET"))
        .and(path(trigger_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(source, "application/sparql-query"))
        .mount(&server)
        .await;
    }
    let describe = |trigger_path: &str| {
      format!(
        r#"<> us:callback <{0}/cb> ; us:trigger <{0}{trigger_path}> ; us:query "{CONSTRUCT_TOPIC}" ."#,
        server.uri()
      )
    };

    assert!(admit(&state, &describe("/a/t")).await.is_admitted());
    assert!(admit(&state, &describe("/a")).await.is_admitted());
    assert!(state.sandbox.is_loaded(&format!("{}/a/t", server.uri())).await);

    let report = publish(&state, fact(1)).await;
    assert_eq!(report, PassReport { evaluated: 2, triggered: 2, failed: 0, delivered: 2 });
  }

  #[tokio::test]
  async fn runaway_trigger_fails_without_blocking_others() {
    let state = make_state().await;
    let slow = subscriber("(if (empty ins) true (while true 1))").await;
    let fast = subscriber("true").await;
    subscribe(&state, &slow, CONSTRUCT_TOPIC).await;
    subscribe(&state, &fast, CONSTRUCT_TOPIC).await;

    let report = publish(&state, fact(1)).await;
    assert_eq!(report, PassReport { evaluated: 2, triggered: 1, failed: 1, delivered: 1 });
    assert!(notifications(&slow).await.is_empty());
    assert_eq!(notifications(&fast).await.len(), 1);
  }

  #[tokio::test]
  async fn rejected_callback_never_reaches_the_registry() {
    let state = make_state().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/cb"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;
    let source = format!("(function <{}/trigger> (del ins) true)", server.uri());
    Mock::given(method("GET"))
      .and(path("/trigger"))
      .respond_with(ResponseTemplate::new(200).set_body_raw(source, "application/sparql-query"))
      .mount(&server)
      .await;

    let outcome = spawn_admission(state.clone(), description(&server, CONSTRUCT_TOPIC)).await.unwrap();
    assert!(!outcome.is_admitted());
    assert!(state.registry.active_subscriptions().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn concurrent_subscriptions_get_distinct_ids() {
    let state = make_state().await;
    let a = subscriber("true").await;
    let b = subscriber("true").await;
    let (first, second) = tokio::join!(
      spawn_admission(state.clone(), description(&a, CONSTRUCT_TOPIC)),
      spawn_admission(state.clone(), description(&b, SELECT_TOPIC)),
    );
    let ids: HashSet<_> = [first.unwrap(), second.unwrap()]
      .into_iter()
      .map(|o| match o {
        AdmissionOutcome::Admitted(sub) => sub.id.unwrap(),
        AdmissionOutcome::Rejected(e) => panic!("rejected: {e}"),
      })
      .collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(state.registry.resources(US_SUBSCRIPTION).await.unwrap(), ids);
  }

  #[tokio::test]
  async fn registry_is_not_visible_in_topic_graphs() {
    let state = make_state().await;
    let server = subscriber("true").await;
    subscribe(&state, &server, CONSTRUCT_TOPIC).await;
    let result = state.store.query(Some(TOPIC), "ASK { ?s ?p ?o }").await.unwrap();
    assert_eq!(result, QueryResult::Boolean(false));
  }
}
