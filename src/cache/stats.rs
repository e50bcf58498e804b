use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use super::counters::{self, read_counter};
use crate::db;

/// Response from `cache_stats`. Reports the store size, never its location.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub issues: u64,
    pub sprints: u64,
    pub searches: u64,
    pub hits: i64,
    pub misses: i64,
    pub hit_rate: f64,
    pub stale_served: i64,
    pub upstream_errors: i64,
    pub purged_issues: i64,
    pub purged_searches: i64,
    pub db_size_bytes: u64,
    pub schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_issue: Option<String>,
    /// Filled in by the retrieval layer when the similarity index is available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<u64>,
}

pub(crate) fn collect(conn: &Connection) -> Result<StatsResponse> {
    let count = |table: &str| -> Result<u64> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(n as u64)
    };

    let hits = read_counter(conn, counters::HITS)?;
    let misses = read_counter(conn, counters::MISSES)?;
    let lookups = hits + misses;

    let (oldest_issue, newest_issue): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(cached_at), MAX(cached_at) FROM issues",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(StatsResponse {
        issues: count("issues")?,
        sprints: count("sprints")?,
        searches: count("searches")?,
        hits,
        misses,
        hit_rate: if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        },
        stale_served: read_counter(conn, counters::STALE_SERVED)?,
        upstream_errors: read_counter(conn, counters::UPSTREAM_ERRORS)?,
        purged_issues: read_counter(conn, counters::PURGED_ISSUES)?,
        purged_searches: read_counter(conn, counters::PURGED_SEARCHES)?,
        db_size_bytes: db::database_size_bytes(conn)?,
        schema_version: db::migrations::get_schema_version(conn)?,
        oldest_issue,
        newest_issue,
        embeddings: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_stats() {
        let conn = crate::db::open_in_memory().unwrap();
        let stats = collect(&conn).unwrap();
        assert_eq!(stats.issues, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
        assert!(stats.oldest_issue.is_none());
    }

    #[test]
    fn serialized_stats_never_mention_a_path() {
        let conn = crate::db::open_in_memory().unwrap();
        let json = serde_json::to_value(collect(&conn).unwrap()).unwrap();
        assert!(json.get("db_path").is_none());
        assert!(json.get("db_size_bytes").is_some());
    }
}
