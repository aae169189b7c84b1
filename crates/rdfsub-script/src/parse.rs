//! S-expression reader.

use crate::error::{EvalError, Result};

const MAX_NESTING: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
  Bool(bool),
  Int(i64),
  Str(String),
  Iri(String),
  Symbol(String),
  List(Vec<Expr>),
}

impl Expr {
  pub fn as_symbol(&self) -> Option<&str> {
    match self {
      Self::Symbol(s) => Some(s),
      _ => None,
    }
  }
}

/// Read every top-level form in `source`.
pub fn parse(source: &str) -> Result<Vec<Expr>> {
  let mut p = Parser { chars: source.chars().collect(), pos: 0, line: 1 };
  let mut forms = Vec::new();
  loop {
    p.skip_trivia();
    if p.pos >= p.chars.len() {
      return Ok(forms);
    }
    forms.push(p.expr(0)?);
  }
}

struct Parser {
  chars: Vec<char>,
  pos:   usize,
  line:  usize,
}

impl Parser {
  fn error(&self, message: impl Into<String>) -> EvalError {
    EvalError::Parse { line: self.line, message: message.into() }
  }

  fn peek(&self) -> Option<char> { self.chars.get(self.pos).copied() }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.pos += 1;
    if c == '\n' {
      self.line += 1;
    }
    Some(c)
  }

  fn skip_trivia(&mut self) {
    while let Some(c) = self.peek() {
      if c == ';' {
        while self.peek().is_some_and(|c| c != '\n') {
          self.bump();
        }
      } else if c.is_whitespace() {
        self.bump();
      } else {
        break;
      }
    }
  }

  fn expr(&mut self, depth: usize) -> Result<Expr> {
    if depth > MAX_NESTING {
      return Err(self.error("nesting too deep"));
    }
    self.skip_trivia();
    let Some(c) = self.peek() else {
      return Err(self.error("unexpected end of input"));
    };
    match c {
      '(' => {
        self.bump();
        let mut items = Vec::new();
        loop {
          self.skip_trivia();
          match self.peek() {
            Some(')') => {
              self.bump();
              return Ok(Expr::List(items));
            }
            Some(_) => items.push(self.expr(depth + 1)?),
            None => return Err(self.error("unclosed '('")),
          }
        }
      }
      ')' => Err(self.error("unexpected ')'")),
      '"' => self.string(),
      '<' if self.chars.get(self.pos + 1).is_some_and(|n| !n.is_whitespace() && *n != ')') => {
        self.iri()
      }
      _ => Ok(self.atom()),
    }
  }

  fn string(&mut self) -> Result<Expr> {
    self.bump();
    let mut out = String::new();
    loop {
      match self.bump() {
        Some('"') => return Ok(Expr::Str(out)),
        Some('\\') => match self.bump() {
          Some('n') => out.push('\n'),
          Some('t') => out.push('\t'),
          Some(c @ ('"' | '\\')) => out.push(c),
          Some(c) => return Err(self.error(format!("unknown escape \\{c}"))),
          None => return Err(self.error("unterminated string")),
        },
        Some(c) => out.push(c),
        None => return Err(self.error("unterminated string")),
      }
    }
  }

  fn iri(&mut self) -> Result<Expr> {
    self.bump();
    let mut out = String::new();
    loop {
      match self.bump() {
        Some('>') => return Ok(Expr::Iri(out)),
        Some(c) if c.is_whitespace() => return Err(self.error("whitespace inside IRI")),
        Some(c) => out.push(c),
        None => return Err(self.error("unterminated IRI")),
      }
    }
  }

  fn atom(&mut self) -> Expr {
    let start = self.pos;
    while self
      .peek()
      .is_some_and(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | ';'))
    {
      self.bump();
    }
    let text: String = self.chars[start..self.pos].iter().collect();
    match text.as_str() {
      "true" => Expr::Bool(true),
      "false" => Expr::Bool(false),
      _ => text.parse().map_or(Expr::Symbol(text), Expr::Int),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_a_trigger_definition() {
    let forms = parse(
      r#"; fires on open tickets
         (function <http://t.example/t> (del ins)
           (match ins _ <http://ex.org/status> "open"))"#,
    )
    .unwrap();
    assert_eq!(forms.len(), 1);
    let Expr::List(items) = &forms[0] else { panic!("expected a list") };
    assert_eq!(items[0], Expr::Symbol("function".into()));
    assert_eq!(items[1], Expr::Iri("http://t.example/t".into()));
    assert_eq!(
      items[2],
      Expr::List(vec![Expr::Symbol("del".into()), Expr::Symbol("ins".into())])
    );
  }

  #[test]
  fn less_than_is_a_symbol_not_an_iri() {
    let forms = parse("(< 1 -2) (- 3 x)").unwrap();
    assert_eq!(
      forms[0],
      Expr::List(vec![Expr::Symbol("<".into()), Expr::Int(1), Expr::Int(-2)])
    );
    assert_eq!(
      forms[1],
      Expr::List(vec![Expr::Symbol("-".into()), Expr::Int(3), Expr::Symbol("x".into())])
    );
  }

  #[test]
  fn unbalanced_input_reports_the_line() {
    let err = parse("(function <http://t>\n  (a b)\n  (if").unwrap_err();
    assert!(matches!(err, EvalError::Parse { line: 3, .. }));
    assert!(parse(")").is_err());
  }

  #[test]
  fn excessive_nesting_is_refused() {
    let deep = "(".repeat(500) + &")".repeat(500);
    assert!(matches!(parse(&deep), Err(EvalError::Parse { .. })));
  }
}
