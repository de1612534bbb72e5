//! In-process cache store.

use super::CacheStore;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Cache store that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory cache store lock poisoned"))
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_if(&self, predicate: &dyn Fn(&str) -> bool) -> Result<usize> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|key, _| !predicate(key.as_str()));
        Ok(before - entries.len())
    }

    fn entries(&self) -> Result<Vec<(String, usize)>> {
        Ok(self
            .lock()?
            .iter()
            .map(|(key, value)| (key.clone(), value.len()))
            .collect())
    }
}
