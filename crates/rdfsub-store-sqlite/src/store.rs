//! [`SqliteStore`]: the SQLite implementation of [`GraphStore`].

use std::{collections::HashSet, path::Path};

use rdfsub_core::{
  delta::{ChangeSet, MutationDelta, Operation},
  store::{GraphStore, QueryResult, Solutions},
  term::{GraphName, Term, Triple},
};
use rdfsub_syntax::sparql::{QueryForm, parse_query, parse_update};

use crate::{
  Result,
  encode::{decode_term, encode_graph, encode_term},
  eval::compile,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A quad store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All writes go
/// through the connection's single background thread, which serialises them.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of quads in `graph`.
  pub async fn count(&self, graph: &GraphName) -> Result<usize> {
    let graph = encode_graph(graph);
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM quads WHERE graph = ?1",
          rusqlite::params![graph],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(n as usize)
  }

  async fn apply(
    &self,
    operation: Operation,
    graph: &GraphName,
    triples: &[Triple],
  ) -> Result<MutationDelta> {
    let graph = graph.clone();
    let triples = triples.to_vec();
    let delta = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let delta = apply_block(&tx, operation, graph, &triples)?;
        tx.commit()?;
        Ok(delta)
      })
      .await?;
    Ok(delta)
  }
}

/// Write one block of facts and record the ones that actually changed.
fn apply_block(
  tx: &rusqlite::Transaction<'_>,
  operation: Operation,
  graph: GraphName,
  triples: &[Triple],
) -> rusqlite::Result<MutationDelta> {
  let sql = match operation {
    Operation::Insert => {
      "INSERT OR IGNORE INTO quads (graph, subject, predicate, object) VALUES (?1, ?2, ?3, ?4)"
    }
    Operation::Delete => {
      "DELETE FROM quads WHERE graph = ?1 AND subject = ?2 AND predicate = ?3 AND object = ?4"
    }
  };
  let graph_str = encode_graph(&graph);
  let mut stmt = tx.prepare_cached(sql)?;
  let mut facts = Vec::new();
  for t in triples {
    let changed = stmt.execute(rusqlite::params![
      graph_str,
      encode_term(&t.subject),
      encode_term(&t.predicate),
      encode_term(&t.object),
    ])?;
    if changed > 0 && !facts.contains(t) {
      facts.push(t.clone());
    }
  }
  Ok(MutationDelta::new(operation, graph, facts))
}

fn decode_row(row: Vec<Option<String>>) -> Result<Vec<Option<Term>>> {
  row
    .into_iter()
    .map(|cell| cell.as_deref().map(decode_term).transpose())
    .collect()
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl GraphStore for SqliteStore {
  type Error = crate::Error;

  async fn query(&self, default_graph: Option<&str>, text: &str) -> Result<QueryResult> {
    let query = parse_query(text)?;
    let compiled = compile(&query, default_graph);
    let width = compiled.columns.len();
    let (sql, params) = (compiled.sql, compiled.params);

    let raws: Vec<Vec<Option<String>>> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            (0..width).map(|i| row.get::<_, Option<String>>(i)).collect()
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    match query.form {
      QueryForm::Ask => Ok(QueryResult::Boolean(!raws.is_empty())),
      QueryForm::Select { .. } => {
        let rows = raws.into_iter().map(decode_row).collect::<Result<_>>()?;
        Ok(QueryResult::Solutions(Solutions { variables: compiled.columns, rows }))
      }
      QueryForm::Construct(template) => {
        let mut seen = HashSet::new();
        let mut graph = Vec::new();
        for raw in raws {
          let row = decode_row(raw)?;
          let lookup = |name: &str| {
            let i = compiled.columns.iter().position(|c| c == name)?;
            row.get(i).cloned().flatten()
          };
          for pattern in &template {
            if let Some(triple) = pattern.instantiate(&lookup) {
              if seen.insert(triple.clone()) {
                graph.push(triple);
              }
            }
          }
        }
        Ok(QueryResult::Graph(graph))
      }
    }
  }

  async fn update(&self, default_graph: Option<&str>, text: &str) -> Result<ChangeSet> {
    let update = parse_update(text)?;
    let default = default_graph.map_or(GraphName::Default, GraphName::named);

    let changes = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut changes = ChangeSet::default();
        for op in update.operations {
          for block in op.blocks {
            let graph = block.graph.map_or_else(|| default.clone(), GraphName::Named);
            changes.push(apply_block(&tx, op.operation, graph, &block.triples)?);
          }
        }
        tx.commit()?;
        Ok(changes)
      })
      .await?;
    Ok(changes)
  }

  async fn insert_data(&self, graph: &GraphName, triples: &[Triple]) -> Result<MutationDelta> {
    self.apply(Operation::Insert, graph, triples).await
  }

  async fn delete_data(&self, graph: &GraphName, triples: &[Triple]) -> Result<MutationDelta> {
    self.apply(Operation::Delete, graph, triples).await
  }
}
