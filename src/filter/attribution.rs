//! Persisted asset-to-creator attribution.
//!
//! Task items carry creator ids, raw assets do not; the attribution
//! table remembers creator identity for assets discovered during scans
//! so later filtered imports can resolve provenance. It is the only
//! state that outlives a single archive call.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::util::{Error, Result};

/// Asset id to creator id.
pub type AttributionTable = HashMap<Uuid, Uuid>;

/// Persistence handle for the attribution table.
///
/// Loaded once at the start of a call, merged with fresh discoveries,
/// written back once at the end. Concurrent writers are
/// last-writer-wins by contract.
pub trait AttributionStore {
    fn load(&self) -> Result<AttributionTable>;
    fn save(&self, table: &AttributionTable) -> Result<()>;
}

/// JSON-file-backed store. A missing file loads as an empty table.
pub struct JsonAttributionStore {
    path: PathBuf,
}

impl JsonAttributionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AttributionStore for JsonAttributionStore {
    fn load(&self) -> Result<AttributionTable> {
        if !self.path.exists() {
            return Ok(AttributionTable::new());
        }
        let data = fs::read(&self.path)?;
        serde_json::from_slice(&data)
            .map_err(|e| Error::Attribution(format!("parsing {}: {e}", self.path.display())))
    }

    fn save(&self, table: &AttributionTable) -> Result<()> {
        let json = serde_json::to_vec_pretty(table)
            .map_err(|e| Error::Attribution(format!("encoding table: {e}")))?;
        // Write-then-rename so a crash never truncates the table.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store for tests and unfiltered calls.
#[derive(Default)]
pub struct MemoryAttributionStore {
    table: RwLock<AttributionTable>,
}

impl MemoryAttributionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = (Uuid, Uuid)>) -> Self {
        Self {
            table: RwLock::new(entries.into_iter().collect()),
        }
    }
}

impl AttributionStore for MemoryAttributionStore {
    fn load(&self) -> Result<AttributionTable> {
        Ok(self.table.read().clone())
    }

    fn save(&self, table: &AttributionTable) -> Result<()> {
        *self.table.write() = table.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonAttributionStore::new(dir.path().join("creators.json"));

        // Missing file reads as empty.
        assert!(store.load().unwrap().is_empty());

        let mut table = AttributionTable::new();
        table.insert(Uuid::new_v4(), Uuid::new_v4());
        table.insert(Uuid::new_v4(), Uuid::new_v4());
        store.save(&table).unwrap();
        assert_eq!(store.load().unwrap(), table);
    }

    #[test]
    fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creators.json");
        fs::write(&path, b"not json").unwrap();
        let store = JsonAttributionStore::new(&path);
        assert!(matches!(store.load(), Err(Error::Attribution(_))));
    }

    #[test]
    fn test_memory_store() {
        let asset = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let store = MemoryAttributionStore::with_entries([(asset, creator)]);
        assert_eq!(store.load().unwrap().get(&asset), Some(&creator));
    }
}
