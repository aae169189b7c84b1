//! Runtime values.

use rdfsub_core::term::{Term, Triple};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Unit,
  Bool(bool),
  Int(i64),
  Str(String),
  Term(Term),
  Fact(Triple),
  List(Vec<Value>),
}

impl Value {
  /// A list of facts, as passed to a trigger's entry function.
  pub fn facts(triples: impl IntoIterator<Item = Triple>) -> Self {
    Self::List(triples.into_iter().map(Self::Fact).collect())
  }

  pub fn type_name(&self) -> &'static str {
    match self {
      Self::Unit => "unit",
      Self::Bool(_) => "boolean",
      Self::Int(_) => "integer",
      Self::Str(_) => "string",
      Self::Term(_) => "term",
      Self::Fact(_) => "fact",
      Self::List(_) => "list",
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Bool(b) => Some(*b),
      _ => None,
    }
  }

  /// Equality that also compares source-level strings and integers with the
  /// literal terms they spell.
  pub fn loosely_equals(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::Str(s), Self::Term(Term::Literal(lit)))
      | (Self::Term(Term::Literal(lit)), Self::Str(s)) => {
        lit.language.is_none() && lit.datatype.is_none() && &lit.lexical == s
      }
      (Self::Int(n), Self::Term(Term::Literal(lit)))
      | (Self::Term(Term::Literal(lit)), Self::Int(n)) => lit.lexical.parse::<i64>() == Ok(*n),
      (Self::List(a), Self::List(b)) => {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
      }
      _ => self == other,
    }
  }
}
