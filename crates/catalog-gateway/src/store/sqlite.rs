//! Durable cache store on SQLite.
//!
//! One table, one row per cache key. Writes are upserts, so the newest payload
//! for a key always replaces the previous one.

use super::CacheStore;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
";

/// SQLite-backed cache store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a cache database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create cache directory: {}", parent.display())
                })?;
            }
        }

        debug!(path = %path.display(), "Opening cache database");

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache database at {}", path.display()))?;

        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "Cache store initialized");
        Ok(store)
    }

    /// Cache database that disappears with the process
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create cache schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("cache database lock poisoned"))
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn()?
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read cache entry {}", key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO cache_entries (key, value, updated_at)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value],
            )
            .with_context(|| format!("Failed to write cache entry {}", key))?;
        Ok(())
    }

    fn remove_if(&self, predicate: &dyn Fn(&str) -> bool) -> Result<usize> {
        let mut conn = self.conn()?;

        let keys: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT key FROM cache_entries")
                .context("Failed to prepare key listing")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to list cache keys")?
        };

        let tx = conn.transaction().context("Failed to begin transaction")?;
        let mut removed = 0;
        for key in keys.iter().filter(|key| predicate(key.as_str())) {
            removed += tx.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        }
        tx.commit().context("Failed to commit cache removal")?;

        Ok(removed)
    }

    fn entries(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key, length(CAST(value AS BLOB)) FROM cache_entries")
            .context("Failed to prepare entry listing")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        let entries = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list cache entries")?;
        Ok(entries)
    }
}
