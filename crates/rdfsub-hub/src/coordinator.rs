//! The update/notification coordinator.
//!
//! Every accepted mutation is applied to the store, and the facts it changed
//! are offered to every registered subscription's trigger. A mutation that
//! changed nothing still gets a pass over the facts it asked for. Triggers
//! that fire get their query evaluated and the result delivered to their
//! callback. Subscriptions are evaluated concurrently and independently.

use std::sync::Arc;

use rdfsub_core::{
  delta::{ChangeSet, MutationDelta, Operation},
  store::GraphStore,
  subscription::Subscription,
  term::{GraphName, Triple},
};
use rdfsub_syntax::sparql;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::{
  AppState,
  dispatcher::DeliveryOutcome,
  error::{Error, Result},
  sandbox::EvaluationContext,
};

/// A write request against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
  /// A SPARQL update request.
  Update(String),
  Insert { graph: GraphName, triples: Vec<Triple> },
  Delete { graph: GraphName, triples: Vec<Triple> },
}

/// What one notification pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
  pub evaluated: usize,
  pub triggered: usize,
  /// Evaluations that ended in a sandbox error.
  pub failed:    usize,
  pub delivered: usize,
}

enum Evaluation {
  Quiet,
  Failed,
  /// The trigger fired; `None` when the query could not be evaluated.
  Triggered(Option<DeliveryOutcome>),
}

/// Apply `mutation` and report the facts it changed, or the facts it
/// requested when the store already matched.
pub async fn apply<S: GraphStore>(state: &AppState<S>, mutation: &Mutation) -> Result<ChangeSet> {
  let mut changes = match mutation {
    Mutation::Update(text) => state.store.update(None, text).await.map_err(Error::store)?,
    Mutation::Insert { graph, triples } => {
      state.store.insert_data(graph, triples).await.map_err(Error::store)?.into()
    }
    Mutation::Delete { graph, triples } => {
      state.store.delete_data(graph, triples).await.map_err(Error::store)?.into()
    }
  };
  if changes.is_empty() {
    debug!("mutation changed nothing, offering the requested facts");
    changes = requested(mutation);
  }
  debug!(
    deleted = changes.deleted().len(),
    inserted = changes.inserted().len(),
    "mutation applied"
  );
  Ok(changes)
}

/// The facts `mutation` names, regardless of the store's state.
fn requested(mutation: &Mutation) -> ChangeSet {
  let mut changes = ChangeSet::default();
  match mutation {
    Mutation::Insert { graph, triples } => {
      changes.push(MutationDelta::new(Operation::Insert, graph.clone(), triples.clone()));
    }
    Mutation::Delete { graph, triples } => {
      changes.push(MutationDelta::new(Operation::Delete, graph.clone(), triples.clone()));
    }
    Mutation::Update(text) => match sparql::parse_update(text) {
      Ok(update) => {
        for op in update.operations {
          for block in op.blocks {
            let graph = block.graph.map_or(GraphName::Default, GraphName::Named);
            changes.push(MutationDelta::new(op.operation, graph, block.triples));
          }
        }
      }
      Err(e) => warn!(error = %e, "could not recover the requested facts"),
    },
  }
  changes
}

/// Apply `mutation` and run a notification pass over its changes, on a
/// background task.
pub fn spawn_update<S: GraphStore + 'static>(
  state: AppState<S>,
  mutation: Mutation,
) -> JoinHandle<Result<PassReport>> {
  tokio::spawn(async move {
    let changes = apply(&state, &mutation).await.inspect_err(|e| {
      error!(error = %e, "mutation rejected by the graph store");
    })?;
    Ok(run_pass(&state, changes).await)
  })
}

/// [`run_pass`] on a background task.
pub fn spawn_pass<S: GraphStore + 'static>(
  state: AppState<S>,
  changes: ChangeSet,
) -> JoinHandle<PassReport> {
  tokio::spawn(async move { run_pass(&state, changes).await })
}

/// Offer `changes` to every registered subscription, even when empty.
pub async fn run_pass<S: GraphStore + 'static>(state: &AppState<S>, changes: ChangeSet) -> PassReport {
  let mut report = PassReport::default();
  let subscriptions = match state.registry.active_subscriptions().await {
    Ok(subscriptions) => subscriptions,
    Err(e) => {
      error!(error = %e, "could not enumerate subscriptions");
      return report;
    }
  };

  let deleted = Arc::new(changes.deleted());
  let inserted = Arc::new(changes.inserted());
  let mut tasks = JoinSet::new();
  for subscription in subscriptions {
    let state = state.clone();
    let (deleted, inserted) = (Arc::clone(&deleted), Arc::clone(&inserted));
    tasks.spawn(async move {
      evaluate(&state, subscription, deleted.to_vec(), inserted.to_vec()).await
    });
  }

  while let Some(joined) = tasks.join_next().await {
    report.evaluated += 1;
    match joined {
      Ok(Evaluation::Quiet) => {}
      Ok(Evaluation::Failed) => report.failed += 1,
      Ok(Evaluation::Triggered(outcome)) => {
        report.triggered += 1;
        if matches!(outcome, Some(DeliveryOutcome::Delivered(_))) {
          report.delivered += 1;
        }
      }
      Err(e) => {
        report.failed += 1;
        error!(error = %e, "subscription evaluation task failed");
      }
    }
  }

  info!(
    evaluated = report.evaluated,
    triggered = report.triggered,
    failed = report.failed,
    delivered = report.delivered,
    "notification pass complete"
  );
  report
}

async fn evaluate<S: GraphStore>(
  state: &AppState<S>,
  subscription: Subscription,
  deleted: Vec<Triple>,
  inserted: Vec<Triple>,
) -> Evaluation {
  let Some(id) = subscription.id.as_deref() else {
    return Evaluation::Failed;
  };

  let context = EvaluationContext::new(&subscription.trigger, deleted, inserted).for_subscription(id);
  match state.sandbox.sandbox().invoke(context).await {
    Ok(true) => {}
    Ok(false) => {
      debug!(subscription = id, "did not trigger");
      return Evaluation::Quiet;
    }
    Err(e) => {
      warn!(subscription = id, trigger = %subscription.trigger, error = %e, "trigger evaluation failed");
      return Evaluation::Failed;
    }
  }

  let result = match state.store.query(None, &subscription.query).await {
    Ok(result) => result,
    Err(e) => {
      error!(subscription = id, error = %e, "notification query failed");
      return Evaluation::Triggered(None);
    }
  };
  let outcome = state.dispatcher.deliver(id, &subscription.callback, &result).await;
  Evaluation::Triggered(Some(outcome))
}
