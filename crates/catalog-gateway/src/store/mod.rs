//! Key/value substrate for cached catalog responses.
//!
//! The gateway only needs string get/set and a key-predicate delete, so any
//! durable or ephemeral map can back it. Values are JSON envelopes holding the
//! unwrapped payload and the unix-millisecond time it was stored.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Injected key/value store used as the cache
pub trait CacheStore: Send + Sync {
    /// Raw stored value for `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete every entry whose key satisfies `predicate`, returning how many went
    fn remove_if(&self, predicate: &dyn Fn(&str) -> bool) -> Result<usize>;

    /// Every stored key with the byte length of its value
    fn entries(&self) -> Result<Vec<(String, usize)>>;
}

/// Stored form of a cached payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The unwrapped `data` payload of the catalog response
    pub data: Value,
    /// When the entry was stored (unix millis)
    pub timestamp: i64,
}

impl CacheEntry {
    pub fn new(data: Value, timestamp: i64) -> Self {
        Self { data, timestamp }
    }

    /// Whether the entry is still trusted at `now` for a TTL in minutes.
    ///
    /// A non-positive TTL never trusts anything, and neither does an age that
    /// does not fit in an `i64`.
    pub fn is_fresh(&self, now: i64, ttl_minutes: i64) -> bool {
        if ttl_minutes <= 0 {
            return false;
        }
        match now.checked_sub(self.timestamp) {
            Some(age) => age < ttl_minutes.saturating_mul(60_000),
            None => false,
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize cache entry")
    }

    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse cache entry")
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
}
