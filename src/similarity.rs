//! Optional vector index over issue summaries and descriptions.
//!
//! Availability is resolved once, at construction: the embedding provider must
//! load and the sqlite-vec `issues_vec` table must be creatable. If either
//! fails the index logs a single warning and stays disabled for the life of
//! the process. Every operation on a disabled index is a no-op returning an
//! empty list, zero, or `false`, so callers never branch on availability
//! themselves.
//!
//! The index holds issue keys only. Removing an issue from the record store
//! does not touch this table; the retrieval layer fans removals out here.

use std::collections::HashSet;
use std::sync::{Arc, MutexGuard};

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};

use crate::config::EmbeddingConfig;
use crate::db::SharedConnection;
use crate::embedding::{self, embedding_to_bytes, EmbeddingProvider, EMBEDDING_DIM};

/// Characters of description appended to the summary before embedding.
pub const DESCRIPTION_EXCERPT_CHARS: usize = 500;

const REINDEX_BATCH: usize = 32;

const VEC_TABLE_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS issues_vec USING vec0(
    id TEXT PRIMARY KEY,
    embedding FLOAT[384]
);
"#;

pub struct SimilarityIndex {
    conn: SharedConnection,
    provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl SimilarityIndex {
    /// Probe the configured provider and the vector table.
    pub fn new(conn: SharedConnection, config: &EmbeddingConfig) -> Self {
        match embedding::create_provider(config) {
            Ok(provider) => Self::with_provider(conn, Arc::from(provider)),
            Err(e) => {
                tracing::warn!(error = %e, "similarity index disabled: embedding model unavailable");
                Self::disabled(conn)
            }
        }
    }

    /// Use an already-loaded provider. The vector table is still probed.
    pub fn with_provider(conn: SharedConnection, provider: Arc<dyn EmbeddingProvider>) -> Self {
        if provider.dimensions() != EMBEDDING_DIM {
            tracing::warn!(
                dims = provider.dimensions(),
                expected = EMBEDDING_DIM,
                "similarity index disabled: provider dimension mismatch"
            );
            return Self::disabled(conn);
        }
        let probe = conn
            .lock()
            .map_err(|e| anyhow!("db lock poisoned: {e}"))
            .and_then(|c| Ok(c.execute_batch(VEC_TABLE_SQL)?));
        match probe {
            Ok(()) => Self {
                conn,
                provider: Some(provider),
            },
            Err(e) => {
                tracing::warn!(error = %e, "similarity index disabled: vector extension unavailable");
                Self::disabled(conn)
            }
        }
    }

    /// A permanently unavailable index.
    pub fn disabled(conn: SharedConnection) -> Self {
        Self {
            conn,
            provider: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    pub fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        match &self.provider {
            Some(p) => Ok(Some(p.embed(text)?)),
            None => Ok(None),
        }
    }

    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        match &self.provider {
            Some(p) => p.embed_batch(texts),
            None => Ok(Vec::new()),
        }
    }

    /// Embed `text` and store it under `key`, replacing any previous vector.
    pub fn upsert(&self, key: &str, text: &str) -> Result<bool> {
        let Some(vector) = self.embed(text)? else {
            return Ok(false);
        };
        let conn = self.lock()?;
        write_vector(&conn, key, &vector)?;
        Ok(true)
    }

    /// [`upsert`](Self::upsert) with the standard summary + excerpt text.
    pub fn upsert_issue(&self, key: &str, summary: &str, description: &str) -> Result<bool> {
        self.upsert(key, &issue_text(summary, description))
    }

    /// Re-embed many issues in batches. Returns the number stored.
    pub fn upsert_issues(&self, issues: &[(String, String, String)]) -> Result<usize> {
        if !self.is_available() {
            return Ok(0);
        }
        let mut stored = 0;
        for chunk in issues.chunks(REINDEX_BATCH) {
            let texts: Vec<String> = chunk
                .iter()
                .map(|(_, summary, description)| issue_text(summary, description))
                .collect();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let vectors = self.embed_batch(&refs)?;

            let conn = self.lock()?;
            let tx = conn.unchecked_transaction()?;
            for ((key, _, _), vector) in chunk.iter().zip(&vectors) {
                write_vector(&tx, key, vector)?;
                stored += 1;
            }
            tx.commit()?;
        }
        Ok(stored)
    }

    /// Nearest issue keys to `text`, closest first, skipping `exclude`.
    ///
    /// Fetches `limit + exclude.len()` neighbours before filtering so that
    /// exclusions do not shrink the result below `limit`.
    pub fn query(&self, text: &str, limit: usize, exclude: &HashSet<String>) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let Some(vector) = self.embed(text)? else {
            return Ok(Vec::new());
        };

        let k = limit + exclude.len();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM issues_vec WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
        )?;
        let neighbours = stmt
            .query_map(params![embedding_to_bytes(&vector), k as i64], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(neighbours
            .into_iter()
            .filter(|key| !exclude.contains(key))
            .take(limit)
            .collect())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        if !self.is_available() {
            return Ok(false);
        }
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM issues_vec WHERE id = ?1", params![key])? > 0)
    }

    pub fn count(&self) -> Result<u64> {
        if !self.is_available() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM issues_vec", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn clear(&self) -> Result<usize> {
        if !self.is_available() {
            return Ok(0);
        }
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM issues_vec", [])?)
    }

    /// Delete vectors whose issue is no longer in the record store.
    pub fn prune_orphans(&self) -> Result<usize> {
        if !self.is_available() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let orphans: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM issues_vec WHERE id NOT IN (SELECT key FROM issues)",
            )?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let tx = conn.unchecked_transaction()?;
        for id in &orphans {
            tx.execute("DELETE FROM issues_vec WHERE id = ?1", params![id])?;
        }
        tx.commit()?;

        if !orphans.is_empty() {
            tracing::info!(removed = orphans.len(), "pruned orphaned embeddings");
        }
        Ok(orphans.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("db lock poisoned: {e}"))
    }
}

/// Summary plus a bounded description excerpt, cut on a char boundary.
pub fn issue_text(summary: &str, description: &str) -> String {
    let excerpt: String = description
        .trim()
        .chars()
        .take(DESCRIPTION_EXCERPT_CHARS)
        .collect();
    if excerpt.is_empty() {
        summary.to_string()
    } else {
        format!("{summary}\n{excerpt}")
    }
}

// vec0 has no upsert; replace by delete + insert.
fn write_vector(conn: &Connection, key: &str, vector: &[f32]) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM issues_vec WHERE id = ?1", params![key])?;
    conn.execute(
        "INSERT INTO issues_vec (id, embedding) VALUES (?1, ?2)",
        params![key, embedding_to_bytes(vector)],
    )?;
    Ok(())
}
