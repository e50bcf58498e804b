//! Keyword index over cached issues.
//!
//! `issues_fts` is a standalone FTS5 table updated explicitly by every issue
//! write and delete in the store (no SQLite triggers). Queries use native FTS5
//! syntax (`AND`/`OR`/`NOT`, `"phrases"`, `prefix*`); a query the engine
//! rejects yields no results instead of an error.

use rusqlite::{params, Connection};

pub(crate) fn upsert(
    conn: &Connection,
    key: &str,
    summary: &str,
    description: &str,
) -> rusqlite::Result<()> {
    remove(conn, key)?;
    conn.execute(
        "INSERT INTO issues_fts (key, summary, description) VALUES (?1, ?2, ?3)",
        params![key, summary, description],
    )?;
    Ok(())
}

pub(crate) fn remove(conn: &Connection, key: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM issues_fts WHERE key = ?1", params![key])?;
    Ok(())
}

pub(crate) fn clear(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM issues_fts", [])?;
    Ok(())
}

/// Trimmed query text, or `None` when nothing searchable remains.
pub fn prepare_query(query: &str) -> Option<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Issue keys matching `query`, best BM25 rank first.
pub(crate) fn matching_keys(conn: &Connection, query: &str, limit: usize) -> Vec<String> {
    let Some(query) = prepare_query(query) else {
        return Vec::new();
    };

    let result = conn
        .prepare(
            "SELECT key FROM issues_fts WHERE issues_fts MATCH ?1 \
             ORDER BY bm25(issues_fts) LIMIT ?2",
        )
        .and_then(|mut stmt| {
            let keys = stmt
                .query_map(params![query, limit as i64], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        });

    match result {
        Ok(keys) => keys,
        Err(e) => {
            tracing::debug!(query = %query, error = %e, "keyword query rejected");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = crate::db::open_in_memory().unwrap();
        upsert(&conn, "PROJ-1", "Login page crashes", "Safari throws on submit").unwrap();
        upsert(&conn, "PROJ-2", "Export to CSV", "Large exports time out").unwrap();
        upsert(&conn, "PROJ-3", "Login rate limiting", "Throttle brute force attempts").unwrap();
        conn
    }

    #[test]
    fn keyword_matches_summary_and_description() {
        let conn = test_db();
        let mut keys = matching_keys(&conn, "login", 10);
        keys.sort();
        assert_eq!(keys, vec!["PROJ-1", "PROJ-3"]);
        assert_eq!(matching_keys(&conn, "safari", 10), vec!["PROJ-1"]);
    }

    #[test]
    fn boolean_and_phrase_queries() {
        let conn = test_db();
        assert_eq!(matching_keys(&conn, "login NOT crashes", 10), vec!["PROJ-3"]);
        assert_eq!(matching_keys(&conn, "\"export to csv\"", 10), vec!["PROJ-2"]);
    }

    #[test]
    fn malformed_query_yields_empty() {
        let conn = test_db();
        assert!(matching_keys(&conn, "\"unbalanced", 10).is_empty());
        assert!(matching_keys(&conn, "AND OR (", 10).is_empty());
    }

    #[test]
    fn blank_query_short_circuits() {
        let conn = test_db();
        assert!(matching_keys(&conn, "   ", 10).is_empty());
        assert!(prepare_query("\t\n").is_none());
    }

    #[test]
    fn upsert_replaces_previous_row() {
        let conn = test_db();
        upsert(&conn, "PROJ-1", "Checkout button misaligned", "").unwrap();
        assert!(!matching_keys(&conn, "login", 10).contains(&"PROJ-1".to_string()));
        assert_eq!(matching_keys(&conn, "checkout", 10), vec!["PROJ-1"]);
    }

    #[test]
    fn remove_drops_row() {
        let conn = test_db();
        remove(&conn, "PROJ-2").unwrap();
        assert!(matching_keys(&conn, "export", 10).is_empty());
    }
}
