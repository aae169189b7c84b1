//! SPARQL Query Results XML Format, for `SELECT` notification payloads.

use std::io::Cursor;

use quick_xml::{
  Writer,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use rdfsub_core::{store::Solutions, term::Term};

use crate::error::{Error, Result};

pub const NS_RESULTS: &str = "http://www.w3.org/2005/sparql-results#";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Render `solutions` as a `<sparql>` results document.
pub fn to_results_xml(solutions: &Solutions) -> Result<String> {
  let mut w = Writer::new(Cursor::new(Vec::new()));
  write(&mut w, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

  let mut root = BytesStart::new("sparql");
  root.push_attribute(("xmlns", NS_RESULTS));
  write(&mut w, Event::Start(root))?;

  write_start(&mut w, "head")?;
  for var in &solutions.variables {
    let mut el = BytesStart::new("variable");
    el.push_attribute(("name", var.as_str()));
    write(&mut w, Event::Empty(el))?;
  }
  write_end(&mut w, "head")?;

  write_start(&mut w, "results")?;
  for row in &solutions.rows {
    write_start(&mut w, "result")?;
    for (var, value) in solutions.variables.iter().zip(row) {
      let Some(term) = value else { continue };
      let mut binding = BytesStart::new("binding");
      binding.push_attribute(("name", var.as_str()));
      write(&mut w, Event::Start(binding))?;
      write_term(&mut w, term)?;
      write_end(&mut w, "binding")?;
    }
    write_end(&mut w, "result")?;
  }
  write_end(&mut w, "results")?;
  write_end(&mut w, "sparql")?;

  String::from_utf8(w.into_inner().into_inner()).map_err(|e| Error::Xml(e.to_string()))
}

fn write_term(w: &mut XmlWriter, term: &Term) -> Result<()> {
  match term {
    Term::Iri(iri) => write_text_elem(w, BytesStart::new("uri"), iri),
    Term::Blank(label) => write_text_elem(w, BytesStart::new("bnode"), label),
    Term::Literal(lit) => {
      let mut el = BytesStart::new("literal");
      if let Some(tag) = &lit.language {
        el.push_attribute(("xml:lang", tag.as_str()));
      } else if let Some(dt) = &lit.datatype {
        el.push_attribute(("datatype", dt.as_str()));
      }
      write_text_elem(w, el, &lit.lexical)
    }
  }
}

fn write(w: &mut XmlWriter, event: Event<'_>) -> Result<()> {
  w.write_event(event).map_err(|e| Error::Xml(e.to_string()))
}

fn write_start(w: &mut XmlWriter, tag: &str) -> Result<()> {
  write(w, Event::Start(BytesStart::new(tag)))
}

fn write_end(w: &mut XmlWriter, tag: &str) -> Result<()> {
  write(w, Event::End(BytesEnd::new(tag)))
}

fn write_text_elem(w: &mut XmlWriter, start: BytesStart<'_>, text: &str) -> Result<()> {
  let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
  write(w, Event::Start(start))?;
  write(w, Event::Text(BytesText::new(text)))?;
  write_end(w, &name)
}
