//! Subscription admission: parse the description, validate the callback and
//! the trigger concurrently, and register the subscription only when both
//! checks pass.

use rdfsub_core::{store::GraphStore, subscription::Subscription};
use rdfsub_script::{Function, Library};
use rdfsub_syntax::turtle;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
  AppState,
  error::{Error, Result},
};

/// Media type a trigger source must be served with.
pub const TRIGGER_MEDIA_TYPE: &str = "application/sparql-query";

#[derive(Debug)]
pub enum AdmissionOutcome {
  Admitted(Subscription),
  Rejected(Error),
}

impl AdmissionOutcome {
  pub fn is_admitted(&self) -> bool { matches!(self, Self::Admitted(_)) }
}

/// Run admission on a background task.
pub fn spawn_admission<S: GraphStore + 'static>(
  state: AppState<S>,
  description: String,
) -> JoinHandle<AdmissionOutcome> {
  tokio::spawn(async move { admit(&state, &description).await })
}

pub async fn admit<S: GraphStore + 'static>(
  state: &AppState<S>,
  description: &str,
) -> AdmissionOutcome {
  match try_admit(state, description).await {
    Ok(subscription) => AdmissionOutcome::Admitted(subscription),
    Err(e) => {
      warn!(error = %e, "subscription rejected");
      AdmissionOutcome::Rejected(e)
    }
  }
}

async fn try_admit<S: GraphStore + 'static>(
  state: &AppState<S>,
  description: &str,
) -> Result<Subscription> {
  let triples =
    turtle::parse(description).map_err(|e| Error::MalformedRequest(e.to_string()))?;
  let pending = Subscription::from_description(&triples)?;
  debug!(callback = %pending.callback, trigger = %pending.trigger, "validating subscription");

  let ((), functions) = tokio::try_join!(
    validate_callback(&state.http, &pending.callback),
    validate_trigger(state, &pending.trigger),
  )?;

  let trigger = pending.trigger.clone();
  let previous = state.sandbox.load(&trigger, functions).await;
  match state.registry.create_subscription(pending, &triples).await {
    Ok(admitted) => Ok(admitted),
    Err(e) => {
      state.sandbox.restore(&trigger, previous).await;
      Err(e)
    }
  }
}

/// Reload the triggers of subscriptions already in the registry, e.g. after a
/// restart against a persisted registry graph. Returns how many loaded.
pub async fn restore_triggers<S: GraphStore + 'static>(state: &AppState<S>) -> Result<usize> {
  let mut loaded = 0;
  for subscription in state.registry.active_subscriptions().await? {
    if state.sandbox.is_loaded(&subscription.trigger).await {
      continue;
    }
    match validate_trigger(state, &subscription.trigger).await {
      Ok(functions) => {
        state.sandbox.load(&subscription.trigger, functions).await;
        loaded += 1;
      }
      Err(e) => warn!(
        subscription = ?subscription.id,
        trigger = %subscription.trigger,
        error = %e,
        "could not restore trigger"
      ),
    }
  }
  Ok(loaded)
}

/// The callback must answer a GET with exactly 204 No Content.
async fn validate_callback(http: &reqwest::Client, callback: &str) -> Result<()> {
  let response = http
    .get(callback)
    .send()
    .await
    .map_err(|e| Error::UnreachableCallback(format!("{callback}: {e}")))?;
  if response.status() != StatusCode::NO_CONTENT {
    return Err(Error::UnreachableCallback(format!(
      "{callback} answered {}, expected 204",
      response.status()
    )));
  }
  info!(callback, "callback validated");
  Ok(())
}

/// Dereference the trigger source, compile it, and run it once with no facts.
/// Returns the compiled functions for loading. Whatever is already loaded for
/// `trigger` stays in place.
async fn validate_trigger<S: GraphStore + 'static>(
  state: &AppState<S>,
  trigger: &str,
) -> Result<Vec<Function>> {
  let invalid = |reason: String| Error::InvalidTriggerSource(format!("{trigger}: {reason}"));

  let response = state.http.get(trigger).send().await.map_err(|e| invalid(e.to_string()))?;
  if response.status() != StatusCode::OK {
    return Err(invalid(format!("answered {}, expected 200", response.status())));
  }
  let media_type = response
    .headers()
    .get(CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .map(media_type)
    .unwrap_or_default();
  if !media_type.eq_ignore_ascii_case(TRIGGER_MEDIA_TYPE) {
    return Err(invalid(format!("served as {media_type:?}, expected {TRIGGER_MEDIA_TYPE}")));
  }
  let source = response.text().await.map_err(|e| invalid(e.to_string()))?;

  let functions = Library::compile(&source, trigger)
    .map_err(|e| Error::TriggerEvaluationFailure(format!("{trigger}: {e}")))?;
  state.sandbox.sandbox().trial(trigger, functions.clone()).await?;
  info!(trigger, "trigger validated");
  Ok(functions)
}

/// The media type of a `Content-Type` value, without parameters.
pub(crate) fn media_type(value: &str) -> &str {
  value.split(';').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
  use rdfsub_core::vocab::US_SUBSCRIPTION;
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
  };

  use super::*;
  use crate::{sandbox::EvaluationContext, tests::make_state};

  /// A subscriber whose callback answers `callback_status` and whose trigger
  /// is served as `content_type` with an entry function returning `body`.
  async fn subscriber(callback_status: u16, content_type: &str, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/cb"))
      .respond_with(ResponseTemplate::new(callback_status))
      .mount(&server)
      .await;
    let source = format!("(function <{}/trigger> (del ins) {body})", server.uri());
    Mock::given(method("GET"))
      .and(path("/trigger"))
      .respond_with(ResponseTemplate::new(200).set_body_raw(source, content_type))
      .mount(&server)
      .await;
    server
  }

  fn description(server: &MockServer) -> String {
    format!(
      r#"<> us:callback <{0}/cb> ; us:trigger <{0}/trigger> ;
            us:query "CONSTRUCT WHERE {{ ?s ?p ?o }}" ."#,
      server.uri()
    )
  }

  #[test]
  fn media_type_drops_parameters() {
    assert_eq!(media_type("application/sparql-query; charset=utf-8"), "application/sparql-query");
    assert_eq!(media_type(""), "");
  }

  #[tokio::test]
  async fn valid_subscription_is_registered_and_loaded() {
    let state = make_state().await;
    let server = subscriber(204, "application/sparql-query; charset=utf-8", "true").await;

    let outcome = admit(&state, &description(&server)).await;
    let AdmissionOutcome::Admitted(sub) = outcome else {
      panic!("expected admission, got {outcome:?}");
    };
    assert!(sub.is_active());
    assert!(state.sandbox.is_loaded(&sub.trigger).await);
    let ids = state.registry.resources(US_SUBSCRIPTION).await.unwrap();
    assert!(ids.contains(sub.id.as_deref().unwrap()));
  }

  #[tokio::test]
  async fn missing_fields_are_malformed() {
    let state = make_state().await;
    let outcome = admit(&state, "<> us:callback <http://sub.test/cb> .").await;
    assert!(matches!(outcome, AdmissionOutcome::Rejected(Error::MalformedRequest(_))));
  }

  #[tokio::test]
  async fn callback_must_answer_204() {
    let state = make_state().await;
    let server = subscriber(404, TRIGGER_MEDIA_TYPE, "true").await;

    let outcome = admit(&state, &description(&server)).await;
    assert!(matches!(outcome, AdmissionOutcome::Rejected(Error::UnreachableCallback(_))));
    assert!(state.registry.resources(US_SUBSCRIPTION).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn trigger_must_be_served_as_a_query() {
    let state = make_state().await;
    let server = subscriber(204, "text/plain", "true").await;

    let outcome = admit(&state, &description(&server)).await;
    assert!(matches!(outcome, AdmissionOutcome::Rejected(Error::InvalidTriggerSource(_))));
    assert!(!state.sandbox.is_loaded(&format!("{}/trigger", server.uri())).await);
  }

  #[tokio::test]
  async fn trigger_using_privileged_forms_is_rejected() {
    let state = make_state().await;
    let server = subscriber(204, TRIGGER_MEDIA_TYPE, "(update) true").await;

    let outcome = admit(&state, &description(&server)).await;
    assert!(matches!(outcome, AdmissionOutcome::Rejected(Error::Sandbox(_))));
    assert!(state.registry.resources(US_SUBSCRIPTION).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn rejected_reuse_of_a_trigger_keeps_the_loaded_one() {
    let state = make_state().await;
    let server = subscriber(204, TRIGGER_MEDIA_TYPE, "true").await;
    let first = admit(&state, &description(&server)).await;
    assert!(first.is_admitted(), "{first:?}");

    let dead = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/cb"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&dead)
      .await;
    let trigger = format!("{}/trigger", server.uri());
    let second = format!(
      r#"<> us:callback <{}/cb> ; us:trigger <{trigger}> ;
            us:query "CONSTRUCT WHERE {{ ?s ?p ?o }}" ."#,
      dead.uri()
    );
    let outcome = admit(&state, &second).await;
    assert!(matches!(outcome, AdmissionOutcome::Rejected(Error::UnreachableCallback(_))));

    assert!(state.sandbox.is_loaded(&trigger).await);
    let fired = state
      .sandbox
      .sandbox()
      .invoke(EvaluationContext::new(trigger, Vec::new(), Vec::new()))
      .await
      .unwrap();
    assert!(fired);
  }

  #[tokio::test]
  async fn non_boolean_trigger_is_rejected() {
    let state = make_state().await;
    let server = subscriber(204, TRIGGER_MEDIA_TYPE, r#""yes""#).await;

    let outcome = admit(&state, &description(&server)).await;
    assert!(matches!(
      outcome,
      AdmissionOutcome::Rejected(Error::Sandbox(crate::sandbox::SandboxError::InvalidReturnType(_)))
    ));
  }
}
