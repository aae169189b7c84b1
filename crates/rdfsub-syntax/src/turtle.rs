//! Turtle documents: subscription and topic descriptions in, notification
//! payloads out.
//!
//! The reader covers the subset descriptions actually use: `@prefix` /
//! `PREFIX`, IRIs, prefixed names, `a`, blank node labels, literals with
//! language tags or datatypes, and `;` / `,` lists. `<>` is kept as the
//! empty IRI so callers can substitute the resource's identifier.

use std::{collections::BTreeMap, fmt::Write};

use rdfsub_core::term::{Term, Triple};

use crate::{
  error::{Error, Result},
  reader::Reader,
};

/// Parse a Turtle document into its triples, in document order.
pub fn parse(input: &str) -> Result<Vec<Triple>> {
  let mut reader = Reader::new(input)?;
  let mut patterns = Vec::new();

  while !reader.at_end() {
    if reader.eat_directive("prefix") {
      reader.declare_prefix()?;
      reader.expect_punct('.')?;
      continue;
    }
    if reader.eat_keyword("PREFIX") {
      reader.declare_prefix()?;
      continue;
    }
    if reader.eat_directive("base") || reader.eat_keyword("BASE") {
      return Err(Error::Unsupported("base IRI declarations".into()));
    }

    reader.triples(false, &mut patterns)?;
    if !reader.eat_punct('.') {
      return Err(reader.error("expected '.' after statement"));
    }
  }

  Ok(patterns.iter().filter_map(|p| p.to_triple()).collect())
}

/// Parse a single term in N-Triples form, e.g. `<http://ex.org/a>` or
/// `"chat"@fr`.
pub fn parse_term(input: &str) -> Result<Term> {
  let mut reader = Reader::new(input)?;
  let term = reader.term(false)?;
  if !reader.at_end() {
    return Err(reader.error("trailing input after term"));
  }
  term.as_term().cloned().ok_or_else(|| reader.error("expected a term"))
}

/// Serialise triples as Turtle, grouping statements by subject.
///
/// Output is deterministic: subjects, then predicate/object pairs, in term
/// order. Duplicate triples are written once.
pub fn serialize(triples: &[Triple]) -> String {
  let mut by_subject: BTreeMap<&Term, Vec<(&Term, &Term)>> = BTreeMap::new();
  for t in triples {
    by_subject
      .entry(&t.subject)
      .or_default()
      .push((&t.predicate, &t.object));
  }

  let mut out = String::new();
  for (subject, mut pairs) in by_subject {
    pairs.sort();
    pairs.dedup();
    let _ = write!(out, "{subject}");
    for (i, (predicate, object)) in pairs.iter().enumerate() {
      let sep = if i == 0 { " " } else { " ;\n    " };
      let _ = write!(out, "{sep}{predicate} {object}");
    }
    out.push_str(" .\n");
  }
  out
}
