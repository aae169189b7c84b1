//! Encoding helpers between RDF terms and the plain-text representations
//! stored in SQLite columns.

use rdfsub_core::term::{GraphName, Term};
use rdfsub_syntax::turtle::parse_term;

use crate::{Error, Result};

// ─── GraphName ───────────────────────────────────────────────────────────────

pub fn encode_graph(graph: &GraphName) -> String {
  graph.as_iri().unwrap_or_default().to_owned()
}

// ─── Term ────────────────────────────────────────────────────────────────────

pub fn encode_term(term: &Term) -> String { term.to_string() }

pub fn decode_term(s: &str) -> Result<Term> {
  // Most stored terms are plain IRIs; skip the tokenizer for them.
  if let Some(iri) = s.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
    if !iri.contains(['<', '>', ' ']) {
      return Ok(Term::iri(iri));
    }
  }
  parse_term(s).map_err(|e| Error::Decode { term: s.to_owned(), reason: e.to_string() })
}
