//! Triple patterns: triples whose positions may hold variables.

use std::fmt;

use rdfsub_core::term::{Term, Triple};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternTerm {
  Var(String),
  Term(Term),
}

impl PatternTerm {
  pub fn as_var(&self) -> Option<&str> {
    match self {
      Self::Var(name) => Some(name),
      Self::Term(_) => None,
    }
  }

  pub fn as_term(&self) -> Option<&Term> {
    match self {
      Self::Var(_) => None,
      Self::Term(term) => Some(term),
    }
  }
}

impl fmt::Display for PatternTerm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Var(name) => write!(f, "?{name}"),
      Self::Term(term) => term.fmt(f),
    }
  }
}

impl From<Term> for PatternTerm {
  fn from(term: Term) -> Self { Self::Term(term) }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
  pub subject:   PatternTerm,
  pub predicate: PatternTerm,
  pub object:    PatternTerm,
}

impl TriplePattern {
  pub fn positions(&self) -> [&PatternTerm; 3] {
    [&self.subject, &self.predicate, &self.object]
  }

  /// The ground triple, if no position holds a variable.
  pub fn to_triple(&self) -> Option<Triple> {
    Some(Triple::new(
      self.subject.as_term()?.clone(),
      self.predicate.as_term()?.clone(),
      self.object.as_term()?.clone(),
    ))
  }

  /// Fill in variables from `binding`. Returns `None` if a variable is unbound
  /// or the result would not be a valid triple.
  pub fn instantiate(&self, binding: impl Fn(&str) -> Option<Term>) -> Option<Triple> {
    let resolve = |p: &PatternTerm| match p {
      PatternTerm::Var(name) => binding(name),
      PatternTerm::Term(term) => Some(term.clone()),
    };
    let triple = Triple::new(
      resolve(&self.subject)?,
      resolve(&self.predicate)?,
      resolve(&self.object)?,
    );
    let valid = triple.subject.is_resource() && triple.predicate.as_iri().is_some();
    valid.then_some(triple)
  }
}

impl fmt::Display for TriplePattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
  }
}
