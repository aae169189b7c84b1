//! Token cursor with the grammar pieces Turtle and SPARQL share: prefix
//! declarations, terms, and triple blocks with `;` / `,` abbreviations.

use std::collections::HashMap;

use rdfsub_core::{
  term::{Literal, Term},
  vocab::{BUILTIN_PREFIXES, RDF_TYPE, XSD_BOOLEAN, XSD_DECIMAL, XSD_INTEGER},
};

use crate::{
  error::{Error, Result},
  lexer::{Spanned, Token, tokenize},
  pattern::{PatternTerm, TriplePattern},
};

pub(crate) struct Reader {
  tokens:   Vec<Spanned>,
  pos:      usize,
  prefixes: HashMap<String, String>,
}

impl Reader {
  pub fn new(input: &str) -> Result<Self> {
    let prefixes = BUILTIN_PREFIXES
      .iter()
      .map(|(p, ns)| (p.to_string(), ns.to_string()))
      .collect();
    Ok(Self { tokens: tokenize(input)?, pos: 0, prefixes })
  }

  // ─── Cursor ──────────────────────────────────────────────────────────────

  pub fn peek(&self) -> Option<&Token> { self.tokens.get(self.pos).map(|s| &s.token) }

  pub fn advance(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).map(|s| s.token.clone());
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  pub fn at_end(&self) -> bool { self.pos >= self.tokens.len() }

  pub fn error(&self, message: impl Into<String>) -> Error {
    let line = self
      .tokens
      .get(self.pos)
      .or_else(|| self.tokens.last())
      .map_or(1, |s| s.line);
    Error::Syntax { line, message: message.into() }
  }

  fn describe_next(&self) -> String {
    match self.peek() {
      Some(token) => format!("{token:?}"),
      None => "end of input".into(),
    }
  }

  pub fn peek_punct(&self, c: char) -> bool { self.peek() == Some(&Token::Punct(c)) }

  pub fn eat_punct(&mut self, c: char) -> bool {
    let hit = self.peek_punct(c);
    if hit {
      self.pos += 1;
    }
    hit
  }

  pub fn expect_punct(&mut self, c: char) -> Result<()> {
    if self.eat_punct(c) {
      Ok(())
    } else {
      Err(self.error(format!("expected '{c}', found {}", self.describe_next())))
    }
  }

  pub fn peek_keyword(&self, keyword: &str) -> bool {
    matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
  }

  pub fn eat_keyword(&mut self, keyword: &str) -> bool {
    let hit = self.peek_keyword(keyword);
    if hit {
      self.pos += 1;
    }
    hit
  }

  pub fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
    if self.eat_keyword(keyword) {
      Ok(())
    } else {
      Err(self.error(format!("expected {keyword}, found {}", self.describe_next())))
    }
  }

  /// Consume a Turtle `@directive`.
  pub fn eat_directive(&mut self, name: &str) -> bool {
    let hit = matches!(self.peek(), Some(Token::LangTag(t)) if t == name);
    if hit {
      self.pos += 1;
    }
    hit
  }

  // ─── Prefixes and IRIs ───────────────────────────────────────────────────

  /// Parse `prefix: <namespace>` after the `PREFIX` keyword has been consumed.
  pub fn declare_prefix(&mut self) -> Result<()> {
    let prefix = match self.advance() {
      Some(Token::PrefixedName { prefix, local }) if local.is_empty() => prefix,
      _ => return Err(self.error("expected a prefix name ending in ':'")),
    };
    let namespace = match self.advance() {
      Some(Token::Iri(iri)) => iri,
      _ => return Err(self.error("expected a namespace IRI")),
    };
    self.prefixes.insert(prefix, namespace);
    Ok(())
  }

  fn expand(&self, prefix: &str, local: &str) -> Result<String> {
    self
      .prefixes
      .get(prefix)
      .map(|ns| format!("{ns}{local}"))
      .ok_or_else(|| Error::UnknownPrefix(prefix.to_string()))
  }

  /// An IRI in either `<...>` or prefixed form.
  pub fn iri(&mut self) -> Result<String> {
    let iri = match self.peek() {
      Some(Token::Iri(iri)) => iri.clone(),
      Some(Token::PrefixedName { prefix, local }) => self.expand(prefix, local)?,
      _ => {
        return Err(self.error(format!("expected an IRI, found {}", self.describe_next())));
      }
    };
    self.pos += 1;
    Ok(iri)
  }

  // ─── Terms and triples ───────────────────────────────────────────────────

  pub fn term(&mut self, allow_vars: bool) -> Result<PatternTerm> {
    let Some(token) = self.advance() else {
      return Err(self.error("unexpected end of input"));
    };
    let term = match token {
      Token::Iri(iri) => Term::Iri(iri),
      Token::PrefixedName { prefix, local } => Term::Iri(self.expand(&prefix, &local)?),
      Token::Blank(label) => Term::Blank(label),
      Token::Var(name) if allow_vars => return Ok(PatternTerm::Var(name)),
      Token::Var(name) => {
        return Err(self.error(format!("variable ?{name} not allowed here")));
      }
      Token::Str(lexical) => self.literal_suffix(lexical)?,
      Token::Integer(lexical) => Literal::typed(lexical, XSD_INTEGER).into(),
      Token::Decimal(lexical) => Literal::typed(lexical, XSD_DECIMAL).into(),
      Token::Word(w) if w == "true" || w == "false" => Literal::typed(w, XSD_BOOLEAN).into(),
      other => {
        self.pos -= 1;
        return Err(self.error(format!("expected a term, found {other:?}")));
      }
    };
    Ok(PatternTerm::Term(term))
  }

  fn literal_suffix(&mut self, lexical: String) -> Result<Term> {
    match self.peek().cloned() {
      Some(Token::LangTag(tag)) => {
        self.pos += 1;
        Ok(Literal::lang(lexical, tag).into())
      }
      Some(Token::DoubleCaret) => {
        self.pos += 1;
        let datatype = self.iri()?;
        Ok(Literal::typed(lexical, datatype).into())
      }
      _ => Ok(Literal::plain(lexical).into()),
    }
  }

  /// One subject with its predicate-object lists, up to (not including) the
  /// terminating `.` or `}`.
  pub fn triples(&mut self, allow_vars: bool, out: &mut Vec<TriplePattern>) -> Result<()> {
    let subject = self.term(allow_vars)?;
    if matches!(&subject, PatternTerm::Term(Term::Literal(_))) {
      return Err(self.error("a literal cannot be a subject"));
    }

    loop {
      let predicate = if self.eat_keyword("a") {
        PatternTerm::Term(Term::iri(RDF_TYPE))
      } else {
        self.term(allow_vars)?
      };
      if matches!(&predicate, PatternTerm::Term(t) if t.as_iri().is_none()) {
        return Err(self.error("a predicate must be an IRI"));
      }

      loop {
        let object = self.term(allow_vars)?;
        out.push(TriplePattern {
          subject:   subject.clone(),
          predicate: predicate.clone(),
          object,
        });
        if !self.eat_punct(',') {
          break;
        }
      }

      if !self.eat_punct(';') {
        return Ok(());
      }
      while self.eat_punct(';') {}
      if self.at_end() || self.peek_punct('.') || self.peek_punct('}') {
        return Ok(());
      }
    }
  }

  /// The contents of a `{ ... }` group, braces included.
  pub fn braced_triples(&mut self, allow_vars: bool) -> Result<Vec<TriplePattern>> {
    self.expect_punct('{')?;
    let mut out = Vec::new();
    while !self.eat_punct('}') {
      if self.at_end() {
        return Err(self.error("unterminated '{'"));
      }
      self.triples(allow_vars, &mut out)?;
      if !self.eat_punct('.') && !self.peek_punct('}') {
        return Err(self.error(format!("expected '.' or '}}', found {}", self.describe_next())));
      }
    }
    Ok(out)
  }
}
