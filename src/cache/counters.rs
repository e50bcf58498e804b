//! Buffered named counters.
//!
//! Increments accumulate in memory and are written to the `counters` table only
//! when the buffer reaches the [`FlushPolicy`] threshold, when stats are read,
//! or at shutdown. Increments buffered at the moment of a crash are lost.

use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::Mutex;

pub const HITS: &str = "hits";
pub const MISSES: &str = "misses";
pub const PURGED_ISSUES: &str = "purged_issues";
pub const PURGED_SEARCHES: &str = "purged_searches";
pub const STALE_SERVED: &str = "stale_served";
pub const UPSTREAM_ERRORS: &str = "upstream_errors";

/// When buffered increments are flushed to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Flush once this many increments are pending. `0` flushes on every increment.
    pub threshold: usize,
}

impl FlushPolicy {
    pub fn every(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Flush synchronously on every increment.
    pub fn immediate() -> Self {
        Self { threshold: 0 }
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self { threshold: 50 }
    }
}

#[derive(Debug, Default)]
struct Pending {
    deltas: HashMap<String, i64>,
    increments: usize,
}

/// In-memory counter buffer with an injectable flush policy.
#[derive(Debug)]
pub struct BufferedCounters {
    pending: Mutex<Pending>,
    policy: FlushPolicy,
}

impl BufferedCounters {
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            policy,
        }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Buffer an increment. Returns `true` when the buffer is due for a flush.
    pub fn add(&self, name: &str, by: i64) -> bool {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *pending.deltas.entry(name.to_string()).or_insert(0) += by;
        pending.increments += 1;
        pending.increments >= self.policy.threshold
    }

    /// Snapshot of buffered (not yet durable) deltas.
    pub fn pending(&self) -> HashMap<String, i64> {
        match self.pending.lock() {
            Ok(guard) => guard.deltas.clone(),
            Err(poisoned) => poisoned.into_inner().deltas.clone(),
        }
    }

    fn take(&self) -> HashMap<String, i64> {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.increments = 0;
        std::mem::take(&mut pending.deltas)
    }

    fn restore(&self, deltas: HashMap<String, i64>) {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (name, delta) in deltas {
            *pending.deltas.entry(name).or_insert(0) += delta;
            pending.increments += 1;
        }
    }

    /// Write all buffered deltas to the `counters` table. On failure the deltas
    /// are put back into the buffer.
    pub fn flush(&self, conn: &Connection) -> rusqlite::Result<usize> {
        let deltas = self.take();
        if deltas.is_empty() {
            return Ok(0);
        }

        match write_deltas(conn, &deltas) {
            Ok(()) => {
                tracing::debug!(counters = deltas.len(), "flushed counters");
                Ok(deltas.len())
            }
            Err(e) => {
                self.restore(deltas);
                Err(e)
            }
        }
    }
}

fn write_deltas(conn: &Connection, deltas: &HashMap<String, i64>) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO counters (name, value) VALUES (?1, ?2) \
             ON CONFLICT(name) DO UPDATE SET value = value + excluded.value",
        )?;
        for (name, delta) in deltas {
            stmt.execute(params![name, delta])?;
        }
    }
    tx.commit()
}

/// Read one durable counter value (zero if never flushed).
pub fn read_counter(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    match conn.query_row(
        "SELECT value FROM counters WHERE name = ?1",
        params![name],
        |row| row.get(0),
    ) {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}
