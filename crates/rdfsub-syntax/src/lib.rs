//! Text formats spoken by the rdfsub hub.
//!
//! Turtle for resource descriptions and graph payloads, SPARQL for queries
//! and updates, and the SPARQL XML results format for tabular payloads.
//! Pure synchronous; no HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use rdfsub_syntax::{sparql, turtle};
//!
//! let triples = turtle::parse("<> a us:Topic .").unwrap();
//! let query = sparql::parse_query("SELECT * WHERE { ?s ?p ?o }").unwrap();
//! println!("{} triples, {:?}", triples.len(), query.projected_variables());
//! ```

pub mod error;
mod lexer;
pub mod pattern;
mod reader;
pub mod results;
pub mod sparql;
pub mod turtle;

pub use error::{Error, Result};
