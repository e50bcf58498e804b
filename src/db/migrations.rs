//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring an older cache file up to [`CURRENT_SCHEMA_VERSION`] in place.

use anyhow::{bail, Result};
use rusqlite::Connection;

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Get the current schema version from the database.
///
/// A missing marker reads as version 1, the oldest known layout.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(val.parse::<u32>().unwrap_or(1)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(1),
        Err(e) => Err(e),
    }
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}

/// Get the stored embedding model identifier, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Set the stored embedding model identifier.
pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations. Each step runs in its own transaction.
///
/// A cache file written by a newer binary is rejected rather than used.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "cache schema version {version} is newer than this binary supports ({CURRENT_SCHEMA_VERSION}); \
             upgrade jira-cache or delete the cache file"
        );
    }

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            3 => migrate_v2_to_v3(&tx)?,
            _ => bail!("no migration to schema version {next}"),
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;

        version = next;
    }

    Ok(())
}

/// Migration v1 → v2: projected hierarchy, priority, label, and date columns on issues.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    let existing = column_names(conn, "issues")?;
    for (column, ddl) in [
        ("parent_key", "ALTER TABLE issues ADD COLUMN parent_key TEXT"),
        ("priority", "ALTER TABLE issues ADD COLUMN priority TEXT NOT NULL DEFAULT ''"),
        ("labels", "ALTER TABLE issues ADD COLUMN labels TEXT NOT NULL DEFAULT '[]'"),
        ("start_date", "ALTER TABLE issues ADD COLUMN start_date TEXT"),
        ("due_date", "ALTER TABLE issues ADD COLUMN due_date TEXT"),
    ] {
        if !existing.iter().any(|c| c == column) {
            conn.execute(ddl, [])?;
        }
    }
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_issues_parent ON issues(parent_key)",
        [],
    )?;
    Ok(())
}

/// Migration v2 → v3: durable counters table.
fn migrate_v2_to_v3(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL DEFAULT 0
        );",
    )
}

fn column_names(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn get_schema_version_returns_1_on_fresh_db() {
        let conn = test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn missing_marker_reads_as_oldest_schema() {
        let conn = test_db();
        conn.execute("DELETE FROM schema_meta WHERE key = 'schema_version'", [])
            .unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn run_migrations_upgrades_to_current() {
        let mut conn = test_db();
        run_migrations(&mut conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);

        let columns = column_names(&conn, "issues").unwrap();
        assert!(columns.contains(&"parent_key".to_string()));
        assert!(columns.contains(&"labels".to_string()));

        let counters: i64 = conn
            .query_row("SELECT COUNT(*) FROM counters", [], |row| row.get(0))
            .unwrap();
        assert_eq!(counters, 0);
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = test_db();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let mut conn = test_db();
        update_schema_version(&conn, CURRENT_SCHEMA_VERSION + 1).unwrap();
        let err = run_migrations(&mut conn).unwrap_err();
        assert!(err.to_string().contains("newer than this binary supports"));
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION + 1);
    }

    #[test]
    fn set_and_get_embedding_model() {
        let mut conn = test_db();
        run_migrations(&mut conn).unwrap();
        assert!(get_embedding_model(&conn).unwrap().is_none());

        set_embedding_model(&conn, "all-MiniLM-L6-v2").unwrap();
        assert_eq!(
            get_embedding_model(&conn).unwrap(),
            Some("all-MiniLM-L6-v2".to_string())
        );
    }
}
