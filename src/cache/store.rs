//! Record store: freshness-checked reads, noise-stripped write-through, purge.
//!
//! [`CacheStore`] owns the `issues`, `sprints`, and `searches` tables plus the
//! buffered counters. Every issue write or delete updates the keyword index in
//! the same transaction. The similarity index is not touched here; callers fan
//! out issue removals to it.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::counters::{self, BufferedCounters, FlushPolicy};
use super::extract::{project_issue, project_sprint};
use super::fts;
use super::noise::strip_noise;
use super::search_key::{normalize_fields, search_key};
use super::stats::{self, StatsResponse};
use super::ttl::AdaptiveTtl;
use super::types::{CachedIssue, CachedSearch, CachedSprint};
use crate::db::{self, SharedConnection};

/// Issues older than this are removed by [`CacheStore::purge_stale`].
pub const ISSUE_PURGE_AGE_DAYS: i64 = 7;
/// Search result sets older than this are removed by [`CacheStore::purge_stale`].
pub const SEARCH_PURGE_AGE_HOURS: i64 = 12;

/// Counts returned from [`CacheStore::purge_stale`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeResult {
    pub issues_removed: usize,
    pub searches_removed: usize,
}

/// Counts returned from [`CacheStore::invalidate_all`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvalidateAllResult {
    pub issues: usize,
    pub sprints: usize,
    pub searches: usize,
}

/// Input to [`CacheStore::put_search`].
#[derive(Debug, Clone, Copy)]
pub struct NewSearch<'a> {
    pub query: &'a str,
    pub fields: &'a [String],
    pub limit: usize,
    pub offset: usize,
    pub total: i64,
    /// Issue records in result order. Each one is written through individually.
    pub issues: &'a [Value],
}

/// A row type with a `cached_at` column.
trait Record: Sized {
    const SELECT: &'static str;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    fn cached_at(&self) -> DateTime<Utc>;
}

const ISSUE_COLUMNS: &str = "key, summary, status, assignee, issue_type, sprint_id, parent_key, \
     priority, labels, start_date, due_date, description_text, raw, cached_at";

impl Record for CachedIssue {
    const SELECT: &'static str = "SELECT key, summary, status, assignee, issue_type, sprint_id, \
         parent_key, priority, labels, start_date, due_date, description_text, raw, cached_at \
         FROM issues WHERE key = ?1";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            summary: row.get(1)?,
            status: row.get(2)?,
            assignee: row.get(3)?,
            issue_type: row.get(4)?,
            sprint_id: row.get(5)?,
            parent_key: row.get(6)?,
            priority: row.get(7)?,
            labels: json_column(row, 8)?,
            start_date: row.get(9)?,
            due_date: row.get(10)?,
            description_text: row.get(11)?,
            raw: json_column(row, 12)?,
            cached_at: timestamp_column(row, 13)?,
        })
    }

    fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }
}

impl Record for CachedSprint {
    const SELECT: &'static str = "SELECT id, name, state, start_date, end_date, goal, raw, cached_at \
         FROM sprints WHERE id = ?1";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            state: row.get(2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            goal: row.get(5)?,
            raw: json_column(row, 6)?,
            cached_at: timestamp_column(row, 7)?,
        })
    }

    fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }
}

impl Record for CachedSearch {
    const SELECT: &'static str = "SELECT query_hash, query, fields, result_keys, total, raw, cached_at \
         FROM searches WHERE query_hash = ?1";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            query_hash: row.get(0)?,
            query: row.get(1)?,
            fields: json_column(row, 2)?,
            result_keys: json_column(row, 3)?,
            total: row.get(4)?,
            raw: json_column(row, 5)?,
            cached_at: timestamp_column(row, 6)?,
        })
    }

    fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }
}

/// The local record store.
pub struct CacheStore {
    conn: SharedConnection,
    counters: BufferedCounters,
    ttl: AdaptiveTtl,
}

impl CacheStore {
    pub fn new(conn: SharedConnection, policy: FlushPolicy, ttl: AdaptiveTtl) -> Self {
        Self {
            conn,
            counters: BufferedCounters::new(policy),
            ttl,
        }
    }

    /// Open (or create and migrate) the store file at `path`.
    pub fn open(path: impl AsRef<Path>, policy: FlushPolicy, ttl: AdaptiveTtl) -> Result<Self> {
        let conn = db::open_database(path)?;
        Ok(Self::new(Arc::new(Mutex::new(conn)), policy, ttl))
    }

    /// In-memory store with the default TTL policy.
    pub fn open_in_memory(policy: FlushPolicy) -> Result<Self> {
        let conn = db::open_in_memory()?;
        Ok(Self::new(
            Arc::new(Mutex::new(conn)),
            policy,
            AdaptiveTtl::default(),
        ))
    }

    /// Handle to the underlying connection, shared with the similarity index.
    pub fn connection(&self) -> SharedConnection {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("db lock poisoned: {e}"))
    }

    // ── Issues ───────────────────────────────────────────────────────────────

    /// Cached issue if present and no older than `max_age`.
    pub fn get_issue(&self, key: &str, max_age: Duration) -> Result<Option<CachedIssue>> {
        self.get_issue_as_of(key, max_age, Utc::now())
    }

    /// [`get_issue`](Self::get_issue) evaluated at an explicit instant.
    pub fn get_issue_as_of(
        &self,
        key: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedIssue>> {
        self.fresh(&key, max_age, now)
    }

    /// Cached issue regardless of age. Last-resort fallback only.
    pub fn get_issue_stale(&self, key: &str) -> Result<Option<CachedIssue>> {
        let conn = self.lock()?;
        lookup(&conn, &key)
    }

    /// Write one issue through to the store. Returns the key, or `None` when
    /// the record has no identifiable key.
    pub fn put_issue(&self, raw: &Value) -> Result<Option<String>> {
        self.put_issue_at(raw, Utc::now())
    }

    /// [`put_issue`](Self::put_issue) with an explicit `cached_at`.
    pub fn put_issue_at(&self, raw: &Value, now: DateTime<Utc>) -> Result<Option<String>> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let key = write_issue(&tx, raw, now)?;
        tx.commit()?;
        Ok(key)
    }

    /// Write every keyed record in one transaction. Keyless records are skipped.
    pub fn put_issues(&self, raws: &[Value]) -> Result<usize> {
        let now = Utc::now();
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let mut written = 0;
        for raw in raws {
            if write_issue(&tx, raw, now)?.is_some() {
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Delete an issue and its keyword-index row. Returns whether it existed.
    pub fn invalidate_issue(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        fts::remove(&tx, key)?;
        let removed = tx.execute("DELETE FROM issues WHERE key = ?1", params![key])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Freshness budget for an issue based on its last cached status.
    pub fn adaptive_ttl(&self, key: &str) -> Result<Duration> {
        let conn = self.lock()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM issues WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(self.ttl.for_status(status.as_deref()))
    }

    /// Ranked keyword search over cached issues. Malformed or blank queries
    /// return an empty list.
    pub fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<CachedIssue>> {
        if fts::prepare_query(query).is_none() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let keys = fts::matching_keys(&conn, query, limit);
        let mut issues = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(issue) = lookup::<CachedIssue>(&conn, &key)? {
                issues.push(issue);
            }
        }
        Ok(issues)
    }

    /// Every cached issue key with its summary and description text.
    pub fn indexable_issues(&self) -> Result<Vec<(String, String, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, summary, description_text FROM issues ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Keys of every cached issue.
    pub fn issue_keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM issues")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    // ── Sprints ──────────────────────────────────────────────────────────────

    pub fn get_sprint(&self, id: i64, max_age: Duration) -> Result<Option<CachedSprint>> {
        self.get_sprint_as_of(id, max_age, Utc::now())
    }

    pub fn get_sprint_as_of(
        &self,
        id: i64,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedSprint>> {
        self.fresh(&id, max_age, now)
    }

    pub fn get_sprint_stale(&self, id: i64) -> Result<Option<CachedSprint>> {
        let conn = self.lock()?;
        lookup(&conn, &id)
    }

    /// Write sprint metadata through. Returns the id, or `None` if the record has none.
    pub fn put_sprint(&self, raw: &Value) -> Result<Option<i64>> {
        let Some(p) = project_sprint(raw) else {
            return Ok(None);
        };
        let clean = strip_noise(raw);
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO sprints (id, name, state, start_date, end_date, goal, raw, cached_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                p.id,
                p.name,
                p.state,
                p.start_date,
                p.end_date,
                p.goal,
                serde_json::to_string(&clean)?,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(Some(p.id))
    }

    pub fn invalidate_sprint(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM sprints WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    // ── Searches ─────────────────────────────────────────────────────────────

    pub fn get_search(&self, query_hash: &str, max_age: Duration) -> Result<Option<CachedSearch>> {
        self.get_search_as_of(query_hash, max_age, Utc::now())
    }

    pub fn get_search_as_of(
        &self,
        query_hash: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedSearch>> {
        self.fresh(&query_hash, max_age, now)
    }

    pub fn get_search_stale(&self, query_hash: &str) -> Result<Option<CachedSearch>> {
        let conn = self.lock()?;
        lookup(&conn, &query_hash)
    }

    /// Write a result set and every contained issue. Returns the search key.
    pub fn put_search(&self, search: NewSearch<'_>) -> Result<String> {
        self.put_search_at(search, Utc::now())
    }

    pub fn put_search_at(&self, search: NewSearch<'_>, now: DateTime<Utc>) -> Result<String> {
        let hash = search_key(search.query, search.fields, search.limit, search.offset);
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut result_keys = Vec::with_capacity(search.issues.len());
        for raw in search.issues {
            if let Some(key) = write_issue(&tx, raw, now)? {
                result_keys.push(key);
            }
        }

        let raw = serde_json::json!({
            "total": search.total,
            "offset": search.offset,
            "limit": search.limit,
        });
        tx.execute(
            "INSERT OR REPLACE INTO searches (query_hash, query, fields, result_keys, total, raw, cached_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                hash,
                search.query,
                serde_json::to_string(&normalize_fields(search.fields))?,
                serde_json::to_string(&result_keys)?,
                search.total,
                serde_json::to_string(&raw)?,
                format_timestamp(now),
            ],
        )?;
        tx.commit()?;
        Ok(hash)
    }

    /// Drop every cached search result set.
    pub fn invalidate_searches(&self) -> Result<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM searches", [])?)
    }

    /// Drop every cached record of every kind.
    pub fn invalidate_all(&self) -> Result<InvalidateAllResult> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        fts::clear(&tx)?;
        let result = InvalidateAllResult {
            issues: tx.execute("DELETE FROM issues", [])?,
            sprints: tx.execute("DELETE FROM sprints", [])?,
            searches: tx.execute("DELETE FROM searches", [])?,
        };
        tx.commit()?;
        Ok(result)
    }

    // ── Maintenance ──────────────────────────────────────────────────────────

    /// Remove issues older than [`ISSUE_PURGE_AGE_DAYS`] and searches older than
    /// [`SEARCH_PURGE_AGE_HOURS`].
    pub fn purge_stale(&self) -> Result<PurgeResult> {
        self.purge_stale_as_of(Utc::now())
    }

    /// [`purge_stale`](Self::purge_stale) evaluated at an explicit instant.
    /// A record aged exactly at the threshold is kept.
    pub fn purge_stale_as_of(&self, now: DateTime<Utc>) -> Result<PurgeResult> {
        let issue_cutoff = format_timestamp(now - Duration::days(ISSUE_PURGE_AGE_DAYS));
        let search_cutoff = format_timestamp(now - Duration::hours(SEARCH_PURGE_AGE_HOURS));

        let result = {
            let conn = self.lock()?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "DELETE FROM issues_fts WHERE key IN (SELECT key FROM issues WHERE cached_at < ?1)",
                params![issue_cutoff],
            )?;
            let issues_removed =
                tx.execute("DELETE FROM issues WHERE cached_at < ?1", params![issue_cutoff])?;
            let searches_removed =
                tx.execute("DELETE FROM searches WHERE cached_at < ?1", params![search_cutoff])?;
            tx.commit()?;
            PurgeResult {
                issues_removed,
                searches_removed,
            }
        };

        if result.issues_removed > 0 {
            self.bump_by(counters::PURGED_ISSUES, result.issues_removed as i64)?;
        }
        if result.searches_removed > 0 {
            self.bump_by(counters::PURGED_SEARCHES, result.searches_removed as i64)?;
        }

        tracing::info!(
            issues = result.issues_removed,
            searches = result.searches_removed,
            "purged stale cache entries"
        );
        Ok(result)
    }

    /// Counts, counters, size, and schema version. Flushes buffered counters first.
    pub fn stats(&self) -> Result<StatsResponse> {
        let conn = self.lock()?;
        self.counters.flush(&conn)?;
        stats::collect(&conn)
    }

    /// Buffer a counter increment, flushing if the policy says so.
    pub fn bump(&self, name: &str) -> Result<()> {
        self.bump_by(name, 1)
    }

    fn bump_by(&self, name: &str, by: i64) -> Result<()> {
        if self.counters.add(name, by) {
            self.flush_counters()?;
        }
        Ok(())
    }

    /// Make all buffered counter increments durable.
    pub fn flush_counters(&self) -> Result<()> {
        let conn = self.lock()?;
        self.counters.flush(&conn)?;
        Ok(())
    }

    /// Buffered counter deltas not yet written.
    pub fn pending_counters(&self) -> std::collections::HashMap<String, i64> {
        self.counters.pending()
    }

    /// Shared freshness check: hit iff present and `now - cached_at <= max_age`.
    /// A non-positive `max_age` always misses but leaves the record in place.
    fn fresh<R: Record>(
        &self,
        id: &dyn ToSql,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<R>> {
        let found = if max_age <= Duration::zero() {
            None
        } else {
            let conn = self.lock()?;
            lookup::<R>(&conn, id)?.filter(|r| now - r.cached_at() <= max_age)
        };

        let counter = if found.is_some() { counters::HITS } else { counters::MISSES };
        tracing::debug!(outcome = counter, "cache lookup");
        self.bump(counter)?;
        Ok(found)
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush_counters() {
            tracing::warn!(error = %e, "failed to flush counters on shutdown");
        }
    }
}

fn lookup<R: Record>(conn: &Connection, id: &dyn ToSql) -> Result<Option<R>> {
    Ok(conn.query_row(R::SELECT, [id], R::from_row).optional()?)
}

/// Strip, project, and upsert one issue plus its keyword-index row.
fn write_issue(conn: &Connection, raw: &Value, now: DateTime<Utc>) -> Result<Option<String>> {
    let clean = strip_noise(raw);
    let Some(p) = project_issue(&clean) else {
        tracing::debug!("skipping issue record without a key");
        return Ok(None);
    };

    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO issues ({ISSUE_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            p.key,
            p.summary,
            p.status,
            p.assignee,
            p.issue_type,
            p.sprint_id,
            p.parent_key,
            p.priority,
            serde_json::to_string(&p.labels)?,
            p.start_date,
            p.due_date,
            p.description_text,
            serde_json::to_string(&clean)?,
            format_timestamp(now),
        ],
    )?;
    fts::upsert(conn, &p.key, &p.summary, &p.description_text)?;

    Ok(Some(p.key))
}

/// Fixed-width UTC timestamps so lexicographic order equals time order.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn store() -> CacheStore {
        CacheStore::open_in_memory(FlushPolicy::immediate()).unwrap()
    }

    fn issue(key: &str, status: &str) -> Value {
        json!({
            "key": key,
            "self": format!("https://example.atlassian.net/rest/api/3/issue/{key}"),
            "fields": {
                "summary": format!("Summary of {key}"),
                "status": {"name": status, "statusCategory": {"key": "x"}},
                "description": "Plain description"
            }
        })
    }

    #[test]
    fn put_then_get_returns_stripped_record() {
        let store = store();
        let raw = issue("PROJ-1", "Done");
        store.put_issue(&raw).unwrap();

        let cached = store.get_issue("PROJ-1", Duration::MAX).unwrap().unwrap();
        assert_eq!(cached.raw, strip_noise(&raw));
        assert_eq!(cached.status, "Done");
        assert_eq!(cached.description_text, "Plain description");
    }

    #[test]
    fn zero_max_age_misses_but_keeps_record() {
        let store = store();
        store.put_issue(&issue("PROJ-1", "Done")).unwrap();
        assert!(store.get_issue("PROJ-1", Duration::zero()).unwrap().is_none());
        assert!(store.get_issue_stale("PROJ-1").unwrap().is_some());
    }

    #[test]
    fn freshness_boundary_is_inclusive() {
        let store = store();
        let t0 = Utc::now();
        store.put_issue_at(&issue("PROJ-1", "Done"), t0).unwrap();

        let age = Duration::seconds(60);
        assert!(store.get_issue_as_of("PROJ-1", age, t0 + age).unwrap().is_some());
        assert!(store
            .get_issue_as_of("PROJ-1", age, t0 + age + Duration::milliseconds(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn sub_microsecond_write_time_survives_the_round_trip() {
        let store = store();
        let t0 = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        store.put_issue_at(&issue("PROJ-1", "Done"), t0).unwrap();

        let age = Duration::seconds(60);
        let hit = store.get_issue_as_of("PROJ-1", age, t0 + age).unwrap().unwrap();
        assert_eq!(hit.cached_at, t0);
        assert_eq!(format_timestamp(t0).len(), format_timestamp(t0 + age).len());
    }

    #[test]
    fn hits_and_misses_are_counted() {
        let store = store();
        store.put_issue(&issue("PROJ-1", "Done")).unwrap();
        store.get_issue("PROJ-1", Duration::MAX).unwrap();
        store.get_issue("PROJ-404", Duration::MAX).unwrap();
        store.get_issue("PROJ-1", Duration::zero()).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn put_issues_skips_keyless() {
        let store = store();
        let written = store
            .put_issues(&[issue("A-1", "Done"), json!({"fields": {}}), issue("A-2", "Done")])
            .unwrap();
        assert_eq!(written, 2);
    }

    #[test]
    fn invalidate_removes_record_and_index_row() {
        let store = store();
        store.put_issue(&issue("PROJ-1", "Done")).unwrap();
        assert_eq!(store.keyword_search("description", 10).unwrap().len(), 1);

        assert!(store.invalidate_issue("PROJ-1").unwrap());
        assert!(store.get_issue_stale("PROJ-1").unwrap().is_none());
        assert!(store.keyword_search("description", 10).unwrap().is_empty());
        assert!(!store.invalidate_issue("PROJ-1").unwrap());
    }

    #[test]
    fn adaptive_ttl_uses_cached_status() {
        let store = store();
        store.put_issue(&issue("PROJ-1", "Done")).unwrap();
        store.put_issue(&issue("PROJ-2", "In Progress")).unwrap();
        let done = store.adaptive_ttl("PROJ-1").unwrap();
        let active = store.adaptive_ttl("PROJ-2").unwrap();
        assert!(done >= active * 10);
        assert_eq!(
            store.adaptive_ttl("PROJ-404").unwrap(),
            AdaptiveTtl::default().fallback()
        );
    }

    #[test]
    fn search_write_through_denormalizes_issues() {
        let store = store();
        let fields = vec!["summary".to_string(), "status".to_string()];
        let issues = vec![issue("S-1", "Done"), issue("S-2", "To Do")];
        let hash = store
            .put_search(NewSearch {
                query: "project = S",
                fields: &fields,
                limit: 50,
                offset: 0,
                total: 2,
                issues: &issues,
            })
            .unwrap();

        let cached = store.get_search(&hash, Duration::MAX).unwrap().unwrap();
        assert_eq!(cached.result_keys, vec!["S-1", "S-2"]);
        assert_eq!(cached.total, 2);
        assert!(store.get_issue_stale("S-2").unwrap().is_some());
    }

    #[test]
    fn sprint_round_trip() {
        let store = store();
        let raw = json!({"id": 7, "name": "Sprint 7", "state": "active", "self": "x"});
        assert_eq!(store.put_sprint(&raw).unwrap(), Some(7));
        let sprint = store.get_sprint(7, Duration::MAX).unwrap().unwrap();
        assert_eq!(sprint.name, "Sprint 7");
        assert!(sprint.raw.get("self").is_none());
        assert!(store.invalidate_sprint(7).unwrap());
        assert!(store.get_sprint_stale(7).unwrap().is_none());
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let store = store();
        store.put_issue(&issue("PROJ-1", "Done")).unwrap();
        store.put_sprint(&json!({"id": 1})).unwrap();
        let result = store.invalidate_all().unwrap();
        assert_eq!(result.issues, 1);
        assert_eq!(result.sprints, 1);
        assert!(store.keyword_search("summary", 10).unwrap().is_empty());
    }
}
