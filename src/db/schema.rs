//! SQL DDL for the base (v1) cache tables.
//!
//! Defines `issues`, `issues_fts` (FTS5), `sprints`, `searches`, and
//! `schema_meta`. Later columns and tables are added by
//! [`migrations`](super::migrations). The `issues_vec` vector table belongs to
//! the similarity index and is created there, only when sqlite-vec is usable.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Cached issues, one row per issue key
CREATE TABLE IF NOT EXISTS issues (
    key TEXT PRIMARY KEY,
    summary TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT '',
    assignee TEXT,
    issue_type TEXT NOT NULL DEFAULT '',
    sprint_id INTEGER,
    description_text TEXT NOT NULL DEFAULT '',
    raw TEXT NOT NULL,
    cached_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_issues_cached_at ON issues(cached_at);
CREATE INDEX IF NOT EXISTS idx_issues_sprint ON issues(sprint_id);

-- Keyword index over issues, maintained by explicit write-through
CREATE VIRTUAL TABLE IF NOT EXISTS issues_fts USING fts5(
    key,
    summary,
    description
);

-- Cached sprint metadata
CREATE TABLE IF NOT EXISTS sprints (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT '',
    start_date TEXT,
    end_date TEXT,
    goal TEXT,
    raw TEXT NOT NULL,
    cached_at TEXT NOT NULL
);

-- Cached search result sets, keyed by normalized query hash
CREATE TABLE IF NOT EXISTS searches (
    query_hash TEXT PRIMARY KEY,
    query TEXT NOT NULL,
    fields TEXT NOT NULL,
    result_keys TEXT NOT NULL,
    total INTEGER NOT NULL,
    raw TEXT NOT NULL,
    cached_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_searches_cached_at ON searches(cached_at);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize the base schema. Idempotent (uses IF NOT EXISTS).
///
/// A store without a version marker is treated as v1 and upgraded by
/// [`run_migrations`](super::migrations::run_migrations).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
