//! Delivery of query results to subscriber callbacks.

use rdfsub_core::store::QueryResult;
use rdfsub_syntax::{results::to_results_xml, turtle};
use reqwest::header::{CONTENT_TYPE, LINK};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const TEXT_TURTLE: &str = "text/turtle";
pub const SPARQL_RESULTS_XML: &str = "application/sparql-results+xml";

/// A serialised notification body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
  pub content_type: &'static str,
  pub body:         String,
}

impl Payload {
  /// Serialise `result` in the media type matching its shape. Boolean
  /// results have no notification format.
  pub fn from_result(result: &QueryResult) -> Option<Self> {
    match result {
      QueryResult::Graph(triples) => {
        Some(Self { content_type: TEXT_TURTLE, body: turtle::serialize(triples) })
      }
      QueryResult::Solutions(solutions) => match to_results_xml(solutions) {
        Ok(body) => Some(Self { content_type: SPARQL_RESULTS_XML, body }),
        Err(e) => {
          warn!(error = %e, "could not serialise solutions");
          None
        }
      },
      QueryResult::Boolean(_) => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
  /// The callback answered with a 2xx status.
  Delivered(u16),
  /// The callback answered with any other status.
  Rejected(u16),
  Unreachable(String),
  /// The result could not be turned into a notification body.
  Unclassifiable,
}

#[derive(Clone)]
pub struct Dispatcher {
  client: reqwest::Client,
}

impl Dispatcher {
  pub fn new(client: reqwest::Client) -> Self { Self { client } }

  /// POST `result` to `callback`, identifying the subscription in a `Link`
  /// header. Failures are logged and reported, never retried.
  pub async fn deliver(
    &self,
    subscription_id: &str,
    callback: &str,
    result: &QueryResult,
  ) -> DeliveryOutcome {
    let Some(payload) = Payload::from_result(result) else {
      warn!(subscription = subscription_id, kind = result.kind(), "unclassifiable query result");
      return DeliveryOutcome::Unclassifiable;
    };

    let response = self
      .client
      .post(callback)
      .header(CONTENT_TYPE, payload.content_type)
      .header(LINK, format!("<{subscription_id}>; rel=\"self\""))
      .body(payload.body)
      .send()
      .await;

    match response {
      Ok(resp) if resp.status().is_success() => {
        let status = resp.status().as_u16();
        info!(subscription = subscription_id, callback, status, "notification delivered");
        DeliveryOutcome::Delivered(status)
      }
      Ok(resp) => {
        let status = resp.status().as_u16();
        warn!(subscription = subscription_id, callback, status, "callback rejected notification");
        DeliveryOutcome::Rejected(status)
      }
      Err(e) => {
        warn!(subscription = subscription_id, callback, error = %e, "callback unreachable");
        DeliveryOutcome::Unreachable(e.to_string())
      }
    }
  }

  /// [`deliver`](Self::deliver) on a background task.
  pub fn dispatch(
    &self,
    subscription_id: String,
    callback: String,
    result: QueryResult,
  ) -> JoinHandle<DeliveryOutcome> {
    let dispatcher = self.clone();
    debug!(subscription = %subscription_id, "dispatching notification");
    tokio::spawn(async move { dispatcher.deliver(&subscription_id, &callback, &result).await })
  }
}

#[cfg(test)]
mod tests {
  use rdfsub_core::{
    store::Solutions,
    term::{Term, Triple},
  };
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
  };

  use super::*;

  const SUB: &str = "http://hub.test/subscriptions/abc";

  fn graph() -> QueryResult {
    QueryResult::Graph(vec![Triple::new(
      Term::iri("http://ex.test/s"),
      Term::iri("http://ex.test/p"),
      Term::iri("http://ex.test/o"),
    )])
  }

  #[test]
  fn payload_media_types_follow_the_result_shape() {
    assert_eq!(Payload::from_result(&graph()).unwrap().content_type, TEXT_TURTLE);
    let solutions = QueryResult::Solutions(Solutions::default());
    assert_eq!(Payload::from_result(&solutions).unwrap().content_type, SPARQL_RESULTS_XML);
    assert!(Payload::from_result(&QueryResult::Boolean(true)).is_none());
  }

  #[tokio::test]
  async fn delivery_posts_with_a_self_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/cb"))
      .and(header("content-type", TEXT_TURTLE))
      .and(header("link", format!("<{SUB}>; rel=\"self\"").as_str()))
      .respond_with(ResponseTemplate::new(200))
      .expect(1)
      .mount(&server)
      .await;

    let dispatcher = Dispatcher::new(reqwest::Client::new());
    let outcome = dispatcher.dispatch(SUB.into(), format!("{}/cb", server.uri()), graph());
    assert_eq!(outcome.await.unwrap(), DeliveryOutcome::Delivered(200));
  }

  #[tokio::test]
  async fn failures_are_reported_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(503))
      .expect(1)
      .mount(&server)
      .await;

    let dispatcher = Dispatcher::new(reqwest::Client::new());
    let outcome = dispatcher.deliver(SUB, &format!("{}/cb", server.uri()), &graph()).await;
    assert_eq!(outcome, DeliveryOutcome::Rejected(503));

    let boolean = dispatcher.deliver(SUB, &server.uri(), &QueryResult::Boolean(true)).await;
    assert_eq!(boolean, DeliveryOutcome::Unclassifiable);
  }
}
