//! SPARQL query and update requests.
//!
//! Queries are basic graph patterns, optionally split across `GRAPH` blocks,
//! under a `SELECT`, `CONSTRUCT` or `ASK` form. Updates are sequences of
//! `INSERT DATA` / `DELETE DATA` operations. Anything else parses to
//! [`Error::Unsupported`] rather than being silently misread.

use rdfsub_core::{delta::Operation, term::Triple};

use crate::{
  error::{Error, Result},
  lexer::Token,
  pattern::{PatternTerm, TriplePattern},
  reader::Reader,
};

// ─── Query AST ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
  All,
  Variables(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryForm {
  Select { distinct: bool, projection: Projection },
  Construct(Vec<TriplePattern>),
  Ask,
}

/// Triple patterns evaluated against one graph. `graph: None` means the
/// query's default dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphPattern {
  pub graph:   Option<String>,
  pub triples: Vec<TriplePattern>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
  pub form:     QueryForm,
  /// `FROM` graphs; empty means the caller decides the default dataset.
  pub dataset:  Vec<String>,
  pub patterns: Vec<GraphPattern>,
  pub limit:    Option<usize>,
  pub offset:   Option<usize>,
}

impl Query {
  /// Every variable in the `WHERE` clause, in order of first appearance.
  pub fn pattern_variables(&self) -> Vec<String> {
    let mut vars: Vec<String> = Vec::new();
    for triple in self.patterns.iter().flat_map(|g| &g.triples) {
      for position in triple.positions() {
        if let PatternTerm::Var(name) = position {
          if !vars.contains(name) {
            vars.push(name.clone());
          }
        }
      }
    }
    vars
  }

  /// The result columns of a `SELECT`; empty for other forms.
  pub fn projected_variables(&self) -> Vec<String> {
    match &self.form {
      QueryForm::Select { projection: Projection::Variables(vars), .. } => vars.clone(),
      QueryForm::Select { projection: Projection::All, .. } => self.pattern_variables(),
      _ => Vec::new(),
    }
  }
}

// ─── Update AST ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
  pub graph:   Option<String>,
  pub triples: Vec<Triple>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOperation {
  pub operation: Operation,
  pub blocks:    Vec<DataBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
  pub operations: Vec<UpdateOperation>,
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

const UNSUPPORTED_GROUP_KEYWORDS: &[&str] =
  &["FILTER", "OPTIONAL", "UNION", "MINUS", "BIND", "VALUES", "SERVICE"];

const UNSUPPORTED_MODIFIERS: &[&str] = &["ORDER", "GROUP", "HAVING"];

fn prologue(reader: &mut Reader) -> Result<()> {
  loop {
    if reader.eat_keyword("PREFIX") {
      reader.declare_prefix()?;
    } else if reader.eat_keyword("BASE") {
      return Err(Error::Unsupported("BASE".into()));
    } else {
      return Ok(());
    }
  }
}

pub fn parse_query(text: &str) -> Result<Query> {
  let mut reader = Reader::new(text)?;
  prologue(&mut reader)?;

  let mut construct_where = false;
  let form = if reader.eat_keyword("SELECT") {
    let distinct = reader.eat_keyword("DISTINCT") || reader.eat_keyword("REDUCED");
    let projection = if reader.eat_punct('*') {
      Projection::All
    } else {
      let mut vars = Vec::new();
      while let Some(PatternTerm::Var(name)) = peek_var(&mut reader)? {
        vars.push(name);
      }
      if vars.is_empty() {
        return Err(reader.error("expected '*' or variables after SELECT"));
      }
      Projection::Variables(vars)
    };
    QueryForm::Select { distinct, projection }
  } else if reader.eat_keyword("CONSTRUCT") {
    if reader.peek_keyword("WHERE") {
      construct_where = true;
      QueryForm::Construct(Vec::new())
    } else {
      QueryForm::Construct(reader.braced_triples(true)?)
    }
  } else if reader.eat_keyword("ASK") {
    QueryForm::Ask
  } else if reader.peek_keyword("DESCRIBE") {
    return Err(Error::Unsupported("DESCRIBE".into()));
  } else {
    return Err(reader.error("expected SELECT, CONSTRUCT or ASK"));
  };

  let mut dataset = Vec::new();
  while reader.eat_keyword("FROM") {
    if reader.peek_keyword("NAMED") {
      return Err(Error::Unsupported("FROM NAMED".into()));
    }
    dataset.push(reader.iri()?);
  }

  reader.eat_keyword("WHERE");
  let patterns = group(&mut reader)?;

  let mut limit = None;
  let mut offset = None;
  loop {
    if reader.eat_keyword("LIMIT") {
      limit = Some(count(&mut reader)?);
    } else if reader.eat_keyword("OFFSET") {
      offset = Some(count(&mut reader)?);
    } else if let Some(kw) = UNSUPPORTED_MODIFIERS.iter().find(|k| reader.peek_keyword(k)) {
      return Err(Error::Unsupported((*kw).into()));
    } else {
      break;
    }
  }

  if !reader.at_end() {
    return Err(reader.error("unexpected trailing input"));
  }

  let form = if construct_where {
    QueryForm::Construct(patterns.iter().flat_map(|g| g.triples.clone()).collect())
  } else {
    form
  };

  Ok(Query { form, dataset, patterns, limit, offset })
}

fn peek_var(reader: &mut Reader) -> Result<Option<PatternTerm>> {
  if matches!(reader.peek(), Some(Token::Var(_))) {
    reader.term(true).map(Some)
  } else {
    Ok(None)
  }
}

fn count(reader: &mut Reader) -> Result<usize> {
  match reader.advance() {
    Some(Token::Integer(n)) => {
      n.parse().map_err(|_| reader.error(format!("invalid count {n}")))
    }
    _ => Err(reader.error("expected a non-negative integer")),
  }
}

/// `{ triples . GRAPH <g> { triples } ... }`
fn group(reader: &mut Reader) -> Result<Vec<GraphPattern>> {
  reader.expect_punct('{')?;
  let mut default = GraphPattern { graph: None, triples: Vec::new() };
  let mut named = Vec::new();

  while !reader.eat_punct('}') {
    if reader.at_end() {
      return Err(reader.error("unterminated group pattern"));
    }
    if let Some(kw) = UNSUPPORTED_GROUP_KEYWORDS.iter().find(|k| reader.peek_keyword(k)) {
      return Err(Error::Unsupported((*kw).into()));
    }
    if reader.peek_punct('{') {
      return Err(Error::Unsupported("nested group patterns".into()));
    }
    if reader.eat_keyword("GRAPH") {
      if matches!(reader.peek(), Some(Token::Var(_))) {
        return Err(Error::Unsupported("GRAPH with a variable".into()));
      }
      let graph = reader.iri()?;
      let triples = reader.braced_triples(true)?;
      named.push(GraphPattern { graph: Some(graph), triples });
      reader.eat_punct('.');
      continue;
    }
    reader.triples(true, &mut default.triples)?;
    if !reader.eat_punct('.') && !matches!(reader.peek(), Some(Token::Punct('}') | Token::Word(_))) {
      return Err(reader.error("expected '.' between triple patterns"));
    }
  }

  let mut patterns = Vec::with_capacity(named.len() + 1);
  if !default.triples.is_empty() || named.is_empty() {
    patterns.push(default);
  }
  patterns.extend(named);
  Ok(patterns)
}

pub fn parse_update(text: &str) -> Result<Update> {
  let mut reader = Reader::new(text)?;
  let mut update = Update::default();

  loop {
    prologue(&mut reader)?;
    if reader.at_end() {
      break;
    }

    let operation = if reader.eat_keyword("INSERT") {
      Operation::Insert
    } else if reader.eat_keyword("DELETE") {
      Operation::Delete
    } else {
      let found = match reader.peek() {
        Some(Token::Word(w)) => w.to_ascii_uppercase(),
        _ => return Err(reader.error("expected INSERT DATA or DELETE DATA")),
      };
      return Err(Error::Unsupported(found));
    };
    if !reader.eat_keyword("DATA") {
      return Err(Error::Unsupported(match operation {
        Operation::Insert => "INSERT with a WHERE clause".into(),
        Operation::Delete => "DELETE with a WHERE clause".into(),
      }));
    }

    update.operations.push(UpdateOperation { operation, blocks: quad_data(&mut reader)? });

    if !reader.eat_punct(';') {
      break;
    }
  }

  if !reader.at_end() {
    return Err(reader.error("unexpected trailing input"));
  }
  Ok(update)
}

/// `{ triples . GRAPH <g> { triples } ... }` with ground terms only.
fn quad_data(reader: &mut Reader) -> Result<Vec<DataBlock>> {
  reader.expect_punct('{')?;
  let mut default = Vec::new();
  let mut blocks = Vec::new();

  while !reader.eat_punct('}') {
    if reader.at_end() {
      return Err(reader.error("unterminated data block"));
    }
    if reader.eat_keyword("GRAPH") {
      let graph = reader.iri()?;
      let patterns = reader.braced_triples(false)?;
      blocks.push(DataBlock {
        graph:   Some(graph),
        triples: patterns.iter().filter_map(TriplePattern::to_triple).collect(),
      });
      reader.eat_punct('.');
      continue;
    }
    reader.triples(false, &mut default)?;
    if !reader.eat_punct('.') && !reader.peek_punct('}') && !reader.peek_keyword("GRAPH") {
      return Err(reader.error("expected '.' between triples"));
    }
  }

  if !default.is_empty() {
    blocks.insert(0, DataBlock {
      graph:   None,
      triples: default.iter().filter_map(TriplePattern::to_triple).collect(),
    });
  }
  Ok(blocks)
}

#[cfg(test)]
mod tests {
  use rdfsub_core::term::{Literal, Term};

  use super::*;

  #[test]
  fn select_with_prefixes_and_graph_block() {
    let q = parse_query(
      "PREFIX ex: <http://ex.org/>
       SELECT DISTINCT ?s ?o WHERE {
         ?s ex:p ?o .
         GRAPH <http://hub/topics/t> { ?s ex:q \"x\" }
       } LIMIT 10",
    )
    .unwrap();
    assert_eq!(q.form, QueryForm::Select {
      distinct:   true,
      projection: Projection::Variables(vec!["s".into(), "o".into()]),
    });
    assert_eq!(q.patterns.len(), 2);
    assert_eq!(q.patterns[0].graph, None);
    assert_eq!(q.patterns[1].graph.as_deref(), Some("http://hub/topics/t"));
    assert_eq!(q.patterns[1].triples[0].object, PatternTerm::Term(Literal::plain("x").into()));
    assert_eq!(q.limit, Some(10));
  }

  #[test]
  fn select_star_projects_pattern_variables_in_order() {
    let q = parse_query("select * where { ?s ?p ?o . ?o ?p2 ?s }").unwrap();
    assert_eq!(q.projected_variables(), vec!["s", "p", "o", "p2"]);
  }

  #[test]
  fn construct_where_shorthand_reuses_the_pattern() {
    let q = parse_query("CONSTRUCT WHERE { ?s a us:Topic }").unwrap();
    let QueryForm::Construct(template) = &q.form else { panic!("not a construct") };
    assert_eq!(template, &q.patterns[0].triples);
  }

  #[test]
  fn ask_with_from() {
    let q = parse_query("ASK FROM <http://g> { <http://s> ?p ?o }").unwrap();
    assert_eq!(q.form, QueryForm::Ask);
    assert_eq!(q.dataset, vec!["http://g".to_string()]);
  }

  #[test]
  fn filter_is_reported_as_unsupported() {
    assert!(matches!(
      parse_query("SELECT * { ?s ?p ?o FILTER (?o) }"),
      Err(Error::Unsupported(kw)) if kw == "FILTER"
    ));
  }

  #[test]
  fn update_sequence_with_graphs() {
    let u = parse_update(
      "PREFIX ex: <http://ex.org/>
       INSERT DATA { GRAPH <http://hub/topics/t> { ex:s ex:p ex:o , ex:o2 } } ;
       DELETE DATA { ex:s ex:p 1 }",
    )
    .unwrap();
    assert_eq!(u.operations.len(), 2);
    let insert = &u.operations[0];
    assert_eq!(insert.operation, Operation::Insert);
    assert_eq!(insert.blocks[0].graph.as_deref(), Some("http://hub/topics/t"));
    assert_eq!(insert.blocks[0].triples.len(), 2);
    let delete = &u.operations[1];
    assert_eq!(delete.operation, Operation::Delete);
    assert_eq!(delete.blocks[0].graph, None);
    assert_eq!(delete.blocks[0].triples[0].object, Term::from(Literal::integer(1)));
  }

  #[test]
  fn update_rejects_variables_and_where_forms() {
    assert!(parse_update("INSERT DATA { ?s <http://p> <http://o> }").is_err());
    assert!(matches!(
      parse_update("DELETE { ?s ?p ?o } WHERE { ?s ?p ?o }"),
      Err(Error::Unsupported(_))
    ));
    assert!(matches!(parse_update("CLEAR ALL"), Err(Error::Unsupported(kw)) if kw == "CLEAR"));
  }
}
