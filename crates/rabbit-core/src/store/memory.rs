//! In-process key-value store.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use super::KeyValueStore;

/// Map-backed store for tests and short-lived sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: HashMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))?;

        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, values: HashMap<String, Value>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))?;

        entries.extend(values);
        Ok(())
    }
}
