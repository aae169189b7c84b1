//! Error type for `rdfsub-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// The query or update text could not be parsed, or uses a construct the
  /// store does not evaluate.
  #[error("syntax error: {0}")]
  Syntax(#[from] rdfsub_syntax::Error),

  /// A stored term no longer parses; the database was written by something
  /// other than this store.
  #[error("corrupt term {term:?}: {reason}")]
  Decode { term: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
