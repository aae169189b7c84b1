//! Subscription: a registered (callback, trigger, query) triple.
//!
//! A subscription is built from the Turtle description a subscriber posts,
//! stays [`SubscriptionState::Pending`] while it is being validated, and is
//! only ever written to the registry once it is [`SubscriptionState::Active`].

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  term::{Term, Triple},
  vocab::{US_CALLBACK, US_QUERY, US_TRIGGER},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
  Pending,
  Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  /// Capability URI; `None` until the subscription is admitted.
  pub id:       Option<String>,
  /// Where notifications are POSTed.
  pub callback: String,
  /// Where the trigger predicate source is dereferenced from. Also the name
  /// of the predicate's entry function.
  pub trigger:  String,
  /// The query whose result is the notification payload.
  pub query:    String,
  pub state:    SubscriptionState,
}

impl Subscription {
  /// Extract a pending subscription from a parsed resource description.
  ///
  /// The first statement carrying each property wins; its subject is not
  /// checked, so a description may use `<>` or any other node.
  pub fn from_description(triples: &[Triple]) -> Result<Self> {
    let callback = iri_property(triples, US_CALLBACK, "us:callback")?;
    let trigger = iri_property(triples, US_TRIGGER, "us:trigger")?;
    let query = object_of(triples, US_QUERY)
      .and_then(Term::as_literal)
      .map(|lit| lit.lexical.clone())
      .filter(|q| !q.trim().is_empty())
      .ok_or(Error::MissingProperty("us:query"))?;

    Ok(Self {
      id: None,
      callback,
      trigger,
      query,
      state: SubscriptionState::Pending,
    })
  }

  /// Mark the subscription active under the capability URI `id`.
  pub fn admit(self, id: impl Into<String>) -> Result<Self> {
    if let Some(existing) = &self.id {
      return Err(Error::AlreadyAdmitted(existing.clone()));
    }
    Ok(Self {
      id: Some(id.into()),
      state: SubscriptionState::Active,
      ..self
    })
  }

  pub fn is_active(&self) -> bool { self.state == SubscriptionState::Active }
}

fn object_of<'a>(triples: &'a [Triple], predicate: &str) -> Option<&'a Term> {
  triples
    .iter()
    .find(|t| t.predicate.as_iri() == Some(predicate))
    .map(|t| &t.object)
}

fn iri_property(
  triples: &[Triple],
  predicate: &str,
  name: &'static str,
) -> Result<String> {
  let term = object_of(triples, predicate).ok_or(Error::MissingProperty(name))?;
  let iri = term.as_iri().ok_or_else(|| Error::InvalidProperty {
    property: name,
    reason:   format!("expected an IRI, found {term}"),
  })?;
  if !(iri.starts_with("http://") || iri.starts_with("https://")) {
    return Err(Error::InvalidProperty {
      property: name,
      reason:   format!("not an absolute http(s) IRI: {iri}"),
    });
  }
  Ok(iri.to_string())
}
