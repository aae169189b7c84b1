//! Topic: a named container of published facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A topic is identified by its capability URI, which is also the name of
/// the graph holding the facts published under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
  pub id:         String,
  pub created_at: DateTime<Utc>,
}
