//! Translation of parsed SPARQL queries into SQL over the `quads` table.
//!
//! Each triple pattern becomes one aliased copy of `quads`. Constant
//! positions become parameterised equality tests, a repeated variable
//! becomes a join condition against its first occurrence, and the graph
//! scope of the pattern constrains the alias's `graph` column.

use std::collections::HashMap;

use rdfsub_syntax::{
  pattern::PatternTerm,
  sparql::{Query, QueryForm},
};

use crate::encode::encode_term;

/// Which graphs a pattern may match in.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
  Any,
  Graph(String),
  AnyOf(Vec<String>),
}

/// A query compiled to a single `SELECT` statement.
#[derive(Debug)]
pub(crate) struct CompiledQuery {
  pub sql:     String,
  pub params:  Vec<String>,
  /// Variable for each selected column, in order.
  pub columns: Vec<String>,
}

const COLUMNS: [&str; 3] = ["subject", "predicate", "object"];

/// Compile `query`. Patterns outside `GRAPH` blocks match the `FROM` graphs
/// if any are given, else `default_graph`, else every graph.
pub(crate) fn compile(query: &Query, default_graph: Option<&str>) -> CompiledQuery {
  let default_scope = if !query.dataset.is_empty() {
    Scope::AnyOf(query.dataset.clone())
  } else if let Some(g) = default_graph {
    Scope::Graph(g.to_owned())
  } else {
    Scope::Any
  };

  let mut tables = Vec::new();
  let mut conds = Vec::new();
  let mut params = Vec::new();
  let mut bound: HashMap<String, String> = HashMap::new();

  let patterns = query.patterns.iter().flat_map(|gp| {
    let scope = gp.graph.clone().map_or_else(|| default_scope.clone(), Scope::Graph);
    gp.triples.iter().map(move |t| (scope.clone(), t))
  });

  for (i, (scope, triple)) in patterns.enumerate() {
    let alias = format!("q{i}");
    tables.push(format!("quads {alias}"));

    match scope {
      Scope::Any => {}
      Scope::Graph(g) => {
        conds.push(format!("{alias}.graph = ?"));
        params.push(g);
      }
      Scope::AnyOf(gs) => {
        let marks = vec!["?"; gs.len()].join(", ");
        conds.push(format!("{alias}.graph IN ({marks})"));
        params.extend(gs);
      }
    }

    for (column, position) in COLUMNS.iter().zip(triple.positions()) {
      let expr = format!("{alias}.{column}");
      match position {
        PatternTerm::Term(term) => {
          conds.push(format!("{expr} = ?"));
          params.push(encode_term(term));
        }
        PatternTerm::Var(name) => match bound.get(name) {
          Some(first) => conds.push(format!("{expr} = {first}")),
          None => {
            bound.insert(name.clone(), expr);
          }
        },
      }
    }
  }

  let (columns, distinct) = match &query.form {
    QueryForm::Select { distinct, .. } => (query.projected_variables(), *distinct),
    QueryForm::Construct(_) => (query.pattern_variables(), true),
    QueryForm::Ask => (Vec::new(), false),
  };

  let select_list = if columns.is_empty() {
    "1".to_owned()
  } else {
    columns
      .iter()
      .map(|v| bound.get(v).cloned().unwrap_or_else(|| "NULL".to_owned()))
      .collect::<Vec<_>>()
      .join(", ")
  };

  let mut sql = format!(
    "SELECT {}{select_list}",
    if distinct { "DISTINCT " } else { "" }
  );
  if !tables.is_empty() {
    sql.push_str(&format!(" FROM {}", tables.join(", ")));
  }
  if !conds.is_empty() {
    sql.push_str(&format!(" WHERE {}", conds.join(" AND ")));
  }

  let limit = match query.form {
    QueryForm::Ask => Some(1),
    _ => query.limit,
  };
  match (limit, query.offset) {
    (Some(l), Some(o)) => sql.push_str(&format!(" LIMIT {l} OFFSET {o}")),
    (Some(l), None) => sql.push_str(&format!(" LIMIT {l}")),
    (None, Some(o)) => sql.push_str(&format!(" LIMIT -1 OFFSET {o}")),
    (None, None) => {}
  }

  CompiledQuery { sql, params, columns }
}
