//! In-memory [`IndexStore`] implementation for tests.
//!
//! Uses a `BTreeMap` keyed by identifier behind a `std::sync::RwLock`, so
//! iteration order (and therefore search order) is deterministic.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{ArchiveRecord, IndexEntry};

use super::IndexStore;

pub struct InMemoryIndex {
    entries: RwLock<BTreeMap<String, IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::StorageUnavailable("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl IndexStore for InMemoryIndex {
    async fn upsert(&self, record: &ArchiveRecord) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        for entry in record.entries() {
            entries.insert(entry.identifier.clone(), entry);
        }
        Ok(())
    }

    async fn lookup(&self, identifier: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(identifier).map(|e| e.digest.clone()))
    }

    async fn search(&self, term: &str) -> Result<Vec<IndexEntry>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .values()
            .filter(|e| e.identifier == term || e.digest == term)
            .cloned()
            .collect())
    }

    async fn delete(&self, digest: &str) -> Result<u64> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, e| e.digest != digest);
        Ok((before - entries.len()) as u64)
    }

    async fn replace_digest(&self, record: &ArchiveRecord) -> Result<u64> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, e| e.digest != record.digest);
        let removed = (before - entries.len()) as u64;
        for entry in record.entries() {
            entries.insert(entry.identifier.clone(), entry);
        }
        Ok(removed)
    }

    async fn replace_all(&self, records: &[ArchiveRecord]) -> Result<u64> {
        let mut fresh = BTreeMap::new();
        for record in records {
            for entry in record.entries() {
                fresh.insert(entry.identifier.clone(), entry);
            }
        }
        let written = fresh.len() as u64;
        *self.entries.write().map_err(poisoned)? = fresh;
        Ok(written)
    }
}
