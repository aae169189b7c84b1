//! The `GraphStore` trait and the shapes of its query results.
//!
//! The trait is implemented by storage backends (e.g. `rdfsub-store-sqlite`).
//! The hub depends on this abstraction, not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  delta::{ChangeSet, MutationDelta},
  term::{GraphName, Term, Triple},
};

// ─── Query results ───────────────────────────────────────────────────────────

/// A table of variable bindings, as produced by a `SELECT` query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solutions {
  /// Projected variable names, without the leading `?`.
  pub variables: Vec<String>,
  /// One entry per solution; `None` marks an unbound variable. Each row has
  /// exactly `variables.len()` entries.
  pub rows:      Vec<Vec<Option<Term>>>,
}

impl Solutions {
  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// All bound values of `variable`, in row order.
  pub fn column<'a>(&'a self, variable: &str) -> impl Iterator<Item = &'a Term> + 'a {
    let index = self.variables.iter().position(|v| v == variable);
    self
      .rows
      .iter()
      .filter_map(move |row| index.and_then(|i| row.get(i)).and_then(Option::as_ref))
  }
}

/// The result of evaluating a query against the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum QueryResult {
  /// Tabular result of a `SELECT`.
  Solutions(Solutions),
  /// Graph result of a `CONSTRUCT`.
  Graph(Vec<Triple>),
  /// Result of an `ASK`.
  Boolean(bool),
}

impl QueryResult {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Solutions(_) => "solutions",
      Self::Graph(_) => "graph",
      Self::Boolean(_) => "boolean",
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a quad store that evaluates queries and updates.
///
/// `default_graph` scopes statements that name no graph: patterns outside a
/// `GRAPH` block and without `FROM` match only that graph, and unscoped
/// `INSERT DATA`/`DELETE DATA` write to it. `None` means "all graphs" for
/// queries and the unnamed default graph for updates.
///
/// Each update call is atomic. The store serialises updates itself; callers
/// do not lock around it.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait GraphStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Evaluate a query.
  fn query<'a>(
    &'a self,
    default_graph: Option<&'a str>,
    text: &'a str,
  ) -> impl Future<Output = Result<QueryResult, Self::Error>> + Send + 'a;

  /// Apply an update request and report what it changed.
  fn update<'a>(
    &'a self,
    default_graph: Option<&'a str>,
    text: &'a str,
  ) -> impl Future<Output = Result<ChangeSet, Self::Error>> + Send + 'a;

  /// Insert `triples` into `graph`. Facts already present are not reported
  /// in the returned delta.
  fn insert_data<'a>(
    &'a self,
    graph: &'a GraphName,
    triples: &'a [Triple],
  ) -> impl Future<Output = Result<MutationDelta, Self::Error>> + Send + 'a;

  /// Delete `triples` from `graph`. Facts that were absent are not reported
  /// in the returned delta.
  fn delete_data<'a>(
    &'a self,
    graph: &'a GraphName,
    triples: &'a [Triple],
  ) -> impl Future<Output = Result<MutationDelta, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn column_skips_unbound_cells() {
    let s = Solutions {
      variables: vec!["a".into(), "b".into()],
      rows:      vec![
        vec![Some(Term::iri("http://x/1")), None],
        vec![None, Some(Term::iri("http://x/2"))],
      ],
    };
    let b: Vec<_> = s.column("b").collect();
    assert_eq!(b, vec![&Term::iri("http://x/2")]);
    assert_eq!(s.column("missing").count(), 0);
  }
}
