// ============================================================================
// RedbStore - Embedded key-value file (redb)
// ============================================================================
// One table of JSON-encoded values keyed by storage key. The path is always
// supplied by the caller.
// ============================================================================

use anyhow::{anyhow, Result};
use redb::{Database, TableDefinition};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::KeyValueStore;

// Table definitions
const SYNC: TableDefinition<&str, &[u8]> = TableDefinition::new("sync");

/// Persistent store backed by a redb file
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Open (or create) the store at the given path, creating parent
    /// directories as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow!("Failed to create {}: {}", parent.display(), e))?;
        }

        info!("Opening store at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure the table exists so reads never fail on a fresh file
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(SYNC)
                .map_err(|e| anyhow!("Failed to create sync table: {}", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for RedbStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(SYNC)
            .map_err(|e| anyhow!("Failed to open sync table: {}", e))?;

        let mut found = HashMap::new();
        for key in keys {
            let entry = table
                .get(*key)
                .map_err(|e| anyhow!("Failed to get {}: {}", key, e))?;

            if let Some(raw) = entry {
                let value: Value = serde_json::from_slice(raw.value())
                    .map_err(|e| anyhow!("Failed to deserialize {}: {}", key, e))?;
                found.insert(key.to_string(), value);
            }
        }

        Ok(found)
    }

    fn set(&self, values: HashMap<String, Value>) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn
                .open_table(SYNC)
                .map_err(|e| anyhow!("Failed to open sync table: {}", e))?;

            for (key, value) in &values {
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| anyhow!("Failed to serialize {}: {}", key, e))?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| anyhow!("Failed to insert {}: {}", key, e))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored {} key(s)", values.len());
        Ok(())
    }
}
