//! Index storage abstraction.
//!
//! The [`IndexStore`] trait is the durable mapping between identifiers,
//! digests, systems, and archive locations. Backends: SQLite (in the
//! `docvault` crate) and [`memory::InMemoryIndex`] for tests.
//!
//! Backends must be `Send + Sync`. They do no locking of their own beyond
//! what the store provides, so concurrent upserts for the same digest resolve
//! as last writer wins at the store's granularity. Backend failures surface
//! as [`Error::StorageUnavailable`](crate::error::Error::StorageUnavailable)
//! and are never retried.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ArchiveRecord, IndexEntry};

/// Durable identifier ↔ digest ↔ location mapping.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](IndexStore::upsert) | Insert or replace one entry per identifier |
/// | [`lookup`](IndexStore::lookup) | Digest for an identifier |
/// | [`search`](IndexStore::search) | Entries whose identifier or digest equals a term |
/// | [`delete`](IndexStore::delete) | Drop every entry of a digest |
/// | [`replace_digest`](IndexStore::replace_digest) | Delete plus upsert for one digest, in one step |
/// | [`replace_all`](IndexStore::replace_all) | Swap the whole index for a fresh set |
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Insert or replace the entry of every identifier in `record`.
    ///
    /// Identifiers are unique keys: an identifier that pointed at another
    /// digest now points at this one. Distinct identifiers sharing the
    /// digest are all kept.
    async fn upsert(&self, record: &ArchiveRecord) -> Result<()>;

    /// Digest for `identifier`, or `None` when it was never indexed.
    async fn lookup(&self, identifier: &str) -> Result<Option<String>>;

    /// Entries whose identifier or digest equals `term` exactly, ordered
    /// by identifier.
    async fn search(&self, term: &str) -> Result<Vec<IndexEntry>>;

    /// Remove every entry of `digest` and return how many were removed.
    /// The archive itself is left alone; deleting it is up to the caller.
    async fn delete(&self, digest: &str) -> Result<u64>;

    /// Drop every entry of `record.digest`, then upsert `record`, as one
    /// atomic step. Returns the number of entries removed. Either both
    /// halves are applied or neither is.
    async fn replace_digest(&self, record: &ArchiveRecord) -> Result<u64>;

    /// Replace the whole index with `records` in one step and return the
    /// number of entries written. Running it twice with the same records
    /// leaves an identical index.
    async fn replace_all(&self, records: &[ArchiveRecord]) -> Result<u64>;
}
