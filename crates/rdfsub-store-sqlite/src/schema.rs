//! SQL schema for the rdfsub SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Terms are stored in their N-Triples form.
-- The unnamed default graph is stored as the empty string.
CREATE TABLE IF NOT EXISTS quads (
    graph     TEXT NOT NULL,
    subject   TEXT NOT NULL,
    predicate TEXT NOT NULL,
    object    TEXT NOT NULL,
    UNIQUE (graph, subject, predicate, object)
);

CREATE INDEX IF NOT EXISTS quads_spo_idx ON quads(subject, predicate, object);
CREATE INDEX IF NOT EXISTS quads_pos_idx ON quads(predicate, object);
CREATE INDEX IF NOT EXISTS quads_osp_idx ON quads(object, subject);

PRAGMA user_version = 1;
";
