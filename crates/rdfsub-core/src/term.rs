//! RDF terms, triples and quads, the facts the hub stores and publishes.
//!
//! Every type renders to its N-Triples form through [`std::fmt::Display`];
//! that form doubles as the storage encoding and as the Turtle output.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::vocab::{XSD_BOOLEAN, XSD_INTEGER, XSD_STRING};

// ─── Literal ─────────────────────────────────────────────────────────────────

/// A literal value with an optional datatype IRI or language tag.
///
/// A literal never carries both; a language-tagged literal has no datatype.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Literal {
  pub lexical:  String,
  pub datatype: Option<String>,
  pub language: Option<String>,
}

impl Literal {
  pub fn plain(lexical: impl Into<String>) -> Self {
    Self { lexical: lexical.into(), datatype: None, language: None }
  }

  pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
    let datatype = datatype.into();
    // xsd:string is the implicit type of a plain literal.
    let datatype = (datatype != XSD_STRING).then_some(datatype);
    Self { lexical: lexical.into(), datatype, language: None }
  }

  pub fn lang(lexical: impl Into<String>, tag: impl Into<String>) -> Self {
    Self {
      lexical:  lexical.into(),
      datatype: None,
      language: Some(tag.into().to_ascii_lowercase()),
    }
  }

  pub fn boolean(value: bool) -> Self { Self::typed(value.to_string(), XSD_BOOLEAN) }

  pub fn integer(value: i64) -> Self { Self::typed(value.to_string(), XSD_INTEGER) }
}

impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "\"{}\"", escape_literal(&self.lexical))?;
    if let Some(tag) = &self.language {
      write!(f, "@{tag}")
    } else if let Some(dt) = &self.datatype {
      write!(f, "^^<{dt}>")
    } else {
      Ok(())
    }
  }
}

/// Escape a lexical form for use between double quotes.
pub fn escape_literal(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '"' => out.push_str("\\\""),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      c => out.push(c),
    }
  }
  out
}

// ─── Term ────────────────────────────────────────────────────────────────────

/// A node in the graph.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Term {
  Iri(String),
  Blank(String),
  Literal(Literal),
}

impl Term {
  pub fn iri(iri: impl Into<String>) -> Self { Self::Iri(iri.into()) }

  /// The empty relative IRI `<>`: the self-reference of a resource
  /// description that has not been assigned an identifier yet.
  pub fn placeholder() -> Self { Self::Iri(String::new()) }

  pub fn is_placeholder(&self) -> bool {
    matches!(self, Self::Iri(iri) if iri.is_empty())
  }

  pub fn as_iri(&self) -> Option<&str> {
    match self {
      Self::Iri(iri) => Some(iri),
      _ => None,
    }
  }

  pub fn as_literal(&self) -> Option<&Literal> {
    match self {
      Self::Literal(lit) => Some(lit),
      _ => None,
    }
  }

  /// The IRI, blank node label, or literal lexical form, whichever applies.
  pub fn value(&self) -> &str {
    match self {
      Self::Iri(iri) => iri,
      Self::Blank(label) => label,
      Self::Literal(lit) => &lit.lexical,
    }
  }

  /// Whether this term may appear in subject position.
  pub fn is_resource(&self) -> bool { !matches!(self, Self::Literal(_)) }
}

impl fmt::Display for Term {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Iri(iri) => write!(f, "<{iri}>"),
      Self::Blank(label) => write!(f, "_:{label}"),
      Self::Literal(lit) => lit.fmt(f),
    }
  }
}

impl From<Literal> for Term {
  fn from(lit: Literal) -> Self { Self::Literal(lit) }
}

// ─── Triple ──────────────────────────────────────────────────────────────────

/// A single statement: the unit that is published, deleted and matched.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Triple {
  pub subject:   Term,
  pub predicate: Term,
  pub object:    Term,
}

impl Triple {
  pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
    Self { subject, predicate, object }
  }

  /// Substitute every occurrence of `from` with `to`.
  pub fn replace(&self, from: &Term, to: &Term) -> Self {
    let swap = |t: &Term| if t == from { to.clone() } else { t.clone() };
    Self {
      subject:   swap(&self.subject),
      predicate: swap(&self.predicate),
      object:    swap(&self.object),
    }
  }
}

impl fmt::Display for Triple {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
  }
}

// ─── Graph names ─────────────────────────────────────────────────────────────

/// The graph a fact lives in: a topic graph, the registry graph, or the
/// store's unnamed default graph.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "iri", rename_all = "snake_case")]
pub enum GraphName {
  Default,
  Named(String),
}

impl GraphName {
  pub fn named(iri: impl Into<String>) -> Self { Self::Named(iri.into()) }

  pub fn as_iri(&self) -> Option<&str> {
    match self {
      Self::Default => None,
      Self::Named(iri) => Some(iri),
    }
  }
}

impl fmt::Display for GraphName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Default => f.write_str("DEFAULT"),
      Self::Named(iri) => write!(f, "<{iri}>"),
    }
  }
}

/// A triple placed in a graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad {
  pub graph:  GraphName,
  pub triple: Triple,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn literal_display_escapes_and_tags() {
    let lit = Literal::plain("say \"hi\"\nbye");
    assert_eq!(lit.to_string(), r#""say \"hi\"\nbye""#);
    assert_eq!(Literal::lang("chat", "FR").to_string(), "\"chat\"@fr");
    assert_eq!(
      Literal::integer(7).to_string(),
      "\"7\"^^<http://www.w3.org/2001/XMLSchema#integer>"
    );
  }

  #[test]
  fn xsd_string_is_normalised_away() {
    let lit = Literal::typed("x", XSD_STRING);
    assert_eq!(lit, Literal::plain("x"));
  }

  #[test]
  fn replace_swaps_placeholder_everywhere() {
    let t = Triple::new(
      Term::placeholder(),
      Term::iri("http://ex.org/p"),
      Term::placeholder(),
    );
    let id = Term::iri("http://hub/subscriptions/abc");
    let swapped = t.replace(&Term::placeholder(), &id);
    assert_eq!(swapped.subject, id);
    assert_eq!(swapped.object, id);
    assert_eq!(swapped.predicate, Term::iri("http://ex.org/p"));
  }
}
