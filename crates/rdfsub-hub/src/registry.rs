//! The registry: topic and subscription metadata kept in one named graph of
//! the store.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rdfsub_core::{
  store::{GraphStore, QueryResult},
  subscription::{Subscription, SubscriptionState},
  term::{GraphName, Literal, Term, Triple},
  topic::Topic,
  vocab::{
    DCTERMS_CREATED, RDF_TYPE, US_CALLBACK, US_QUERY, US_SUBSCRIPTION, US_TOPIC, US_TRIGGER,
    XSD_DATE_TIME,
  },
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
  capability::{CapabilityUriGenerator, Container},
  error::{Error, Result},
};

pub struct Registry<S> {
  store:     Arc<S>,
  graph:     String,
  generator: CapabilityUriGenerator,
  /// Held from listing existing identifiers until the new resource is
  /// written, so two allocations in the same class cannot collide.
  alloc:     Mutex<()>,
}

impl<S: GraphStore> Registry<S> {
  pub fn new(store: Arc<S>, graph: impl Into<String>, generator: CapabilityUriGenerator) -> Self {
    Self { store, graph: graph.into(), generator, alloc: Mutex::new(()) }
  }

  /// IRI of the registry graph.
  pub fn graph(&self) -> &str { &self.graph }

  pub fn generator(&self) -> &CapabilityUriGenerator { &self.generator }

  /// Identifiers of every registered resource of `class`.
  pub async fn resources(&self, class: &str) -> Result<HashSet<String>> {
    let text = format!("SELECT ?resource WHERE {{ ?resource a <{class}> }}");
    let result = self
      .store
      .query(Some(self.graph.as_str()), &text)
      .await
      .map_err(Error::store)?;
    let QueryResult::Solutions(solutions) = result else {
      return Ok(HashSet::new());
    };
    Ok(solutions.column("resource").filter_map(Term::as_iri).map(str::to_owned).collect())
  }

  /// Allocate a fresh capability URI in `container`, substitute it for the
  /// `<>` placeholder in `description`, and write the result together with
  /// the resource's type and creation time. Returns the URI and the creation
  /// time as written.
  pub async fn create_resource(
    &self,
    container: Container,
    class: &str,
    description: &[Triple],
  ) -> Result<(String, DateTime<Utc>)> {
    let _alloc = self.alloc.lock().await;
    let existing = self.resources(class).await?;
    let id = self.generator.generate_unique(container.path(), &existing);
    let subject = Term::iri(&id);
    let created_at = Utc::now().trunc_subsecs(0);

    let mut triples: Vec<Triple> = description
      .iter()
      .map(|t| t.replace(&Term::placeholder(), &subject))
      .collect();
    triples.push(Triple::new(subject.clone(), Term::iri(RDF_TYPE), Term::iri(class)));
    triples.push(Triple::new(
      subject,
      Term::iri(DCTERMS_CREATED),
      Literal::typed(created_at.to_rfc3339_opts(SecondsFormat::Secs, true), XSD_DATE_TIME).into(),
    ));

    let graph = GraphName::named(&self.graph);
    self.store.insert_data(&graph, &triples).await.map_err(Error::store)?;
    debug!(%id, class, facts = triples.len(), "registered resource");
    Ok((id, created_at))
  }

  pub async fn create_topic(&self, description: &[Triple]) -> Result<Topic> {
    let (id, created_at) = self.create_resource(Container::Topics, US_TOPIC, description).await?;
    info!(%id, "created topic");
    Ok(Topic { id, created_at })
  }

  /// Register a validated subscription and return it admitted under its new
  /// capability URI.
  ///
  /// The stored description holds the callback, trigger, and query, plus
  /// any other statements the subscriber sent.
  pub async fn create_subscription(
    &self,
    subscription: Subscription,
    description: &[Triple],
  ) -> Result<Subscription> {
    let mut triples = description.to_vec();
    let this = Term::placeholder();
    let required = [
      Triple::new(this.clone(), Term::iri(US_CALLBACK), Term::iri(&subscription.callback)),
      Triple::new(this.clone(), Term::iri(US_TRIGGER), Term::iri(&subscription.trigger)),
      Triple::new(this, Term::iri(US_QUERY), Literal::plain(&subscription.query).into()),
    ];
    for t in required {
      if !triples.contains(&t) {
        triples.push(t);
      }
    }

    let (id, _) =
      self.create_resource(Container::Subscriptions, US_SUBSCRIPTION, &triples).await?;
    let admitted = subscription.admit(&id)?;
    info!(%id, callback = %admitted.callback, trigger = %admitted.trigger, "subscription admitted");
    Ok(admitted)
  }

  /// Every registered subscription, read fresh from the store.
  pub async fn active_subscriptions(&self) -> Result<Vec<Subscription>> {
    let text = format!(
      "SELECT ?subscription ?callback ?trigger ?query WHERE {{ \
         ?subscription a <{US_SUBSCRIPTION}> ; <{US_CALLBACK}> ?callback ; \
         <{US_TRIGGER}> ?trigger ; <{US_QUERY}> ?query }}"
    );
    let result = self
      .store
      .query(Some(self.graph.as_str()), &text)
      .await
      .map_err(Error::store)?;
    let QueryResult::Solutions(solutions) = result else {
      return Ok(Vec::new());
    };

    let mut seen = HashSet::new();
    let mut subscriptions = Vec::new();
    for row in &solutions.rows {
      let [Some(id), Some(callback), Some(trigger), Some(query)] = row.as_slice() else {
        continue;
      };
      let (Some(id), Some(callback), Some(trigger)) =
        (id.as_iri(), callback.as_iri(), trigger.as_iri())
      else {
        continue;
      };
      if !seen.insert(id.to_owned()) {
        continue;
      }
      subscriptions.push(Subscription {
        id:       Some(id.to_owned()),
        callback: callback.to_owned(),
        trigger:  trigger.to_owned(),
        query:    query.value().to_owned(),
        state:    SubscriptionState::Active,
      });
    }
    Ok(subscriptions)
  }
}
