//! Mutation deltas: the ephemeral record of what one update changed.
//!
//! A delta is produced by the graph store when a mutation is applied and is
//! consumed once by the update coordinator. It is never persisted.

use serde::{Deserialize, Serialize};

use crate::term::{GraphName, Triple};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
  Insert,
  Delete,
}

/// The facts one operation actually added to or removed from one graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationDelta {
  pub operation: Operation,
  pub graph:     GraphName,
  pub facts:     Vec<Triple>,
}

impl MutationDelta {
  pub fn new(operation: Operation, graph: GraphName, facts: Vec<Triple>) -> Self {
    Self { operation, graph, facts }
  }

  pub fn is_empty(&self) -> bool { self.facts.is_empty() }
}

/// Every delta produced by a single update request, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
  pub deltas: Vec<MutationDelta>,
}

impl ChangeSet {
  pub fn push(&mut self, delta: MutationDelta) {
    if !delta.is_empty() {
      self.deltas.push(delta);
    }
  }

  pub fn is_empty(&self) -> bool { self.deltas.iter().all(MutationDelta::is_empty) }

  pub fn deleted(&self) -> Vec<Triple> { self.facts(Operation::Delete) }

  pub fn inserted(&self) -> Vec<Triple> { self.facts(Operation::Insert) }

  fn facts(&self, operation: Operation) -> Vec<Triple> {
    self
      .deltas
      .iter()
      .filter(|d| d.operation == operation)
      .flat_map(|d| d.facts.iter().cloned())
      .collect()
  }
}

impl From<MutationDelta> for ChangeSet {
  fn from(delta: MutationDelta) -> Self {
    let mut set = Self::default();
    set.push(delta);
    set
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::term::Term;

  fn fact(o: &str) -> Triple {
    Triple::new(
      Term::iri("http://ex.org/s"),
      Term::iri("http://ex.org/p"),
      Term::iri(o),
    )
  }

  #[test]
  fn change_set_splits_by_operation() {
    let g = GraphName::named("http://hub/topics/t");
    let mut set = ChangeSet::default();
    set.push(MutationDelta::new(Operation::Delete, g.clone(), vec![fact("http://ex.org/a")]));
    set.push(MutationDelta::new(Operation::Insert, g.clone(), vec![fact("http://ex.org/b")]));
    set.push(MutationDelta::new(Operation::Insert, g, vec![]));

    assert_eq!(set.deltas.len(), 2);
    assert_eq!(set.deleted(), vec![fact("http://ex.org/a")]);
    assert_eq!(set.inserted(), vec![fact("http://ex.org/b")]);
    assert!(!set.is_empty());
  }
}
