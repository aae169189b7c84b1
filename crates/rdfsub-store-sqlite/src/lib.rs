//! SQLite backend for the rdfsub graph store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Quads live in a single table; basic
//! graph patterns compile to one self-join over it.

mod encode;
mod eval;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
