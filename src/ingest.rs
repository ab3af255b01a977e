//! Archive store and delete flows.
//!
//! Storing: read the documents (bounded parallel) → digest → write the
//! archive under the archive root → replace the digest's index entries.
//! Updating a manifest: rewrite it in the archive and re-index the digest
//! with the new meta time.
//! Deleting: remove the archive directory and drop the digest from the
//! index. Both halves are needed for a consistent deletion.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use docvault_core::digest::compute_digest;
use docvault_core::error::{Error, Result};
use docvault_core::identifier::{sniff_syntax, strip_routing_prefix, Syntax};
use docvault_core::models::{join_identifiers, ArchiveRecord};
use docvault_core::store::IndexStore;

use crate::archive::{
    self, archive_path, read_archive_meta, write_archive, ArchiveFile, MetaRecord,
};
use crate::batch::read_documents;
use crate::config::Config;
use crate::reader::Reader;
use crate::sqlite_store::SqliteIndex;

/// What to put in a new archive.
#[derive(Debug, Clone)]
pub struct StoreRequest {
    /// Document identifiers, in archive order.
    pub documents: Vec<String>,
    /// Index identifiers, possibly with `,key:value` qualifiers. When empty
    /// the document identifiers are indexed.
    pub indexes: Vec<String>,
    pub manifest: String,
    pub system: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreOutcome {
    pub digest: String,
    pub files_hash: String,
    pub location: PathBuf,
    pub identifiers: Vec<String>,
    pub files: usize,
}

/// Name of the `position`-th (1-based) file inside the archive.
///
/// ```rust
/// use docvault::ingest::stored_name;
///
/// assert_eq!(stored_name(1, "/misc/fedb67/3.jpg"), "00000001.jpg");
/// assert_eq!(stored_name(12, "/misc/fedb67/README"), "00000012");
/// ```
pub fn stored_name(position: usize, id: &str) -> String {
    let ids = strip_routing_prefix(id);
    let last = match sniff_syntax(ids) {
        Syntax::Current => ids.rsplit('/').next().unwrap_or(ids),
        Syntax::Legacy => ids,
    };
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && !ext.contains('/') => {
            format!("{position:08}.{}", ext.to_ascii_lowercase())
        }
        _ => format!("{position:08}"),
    }
}

/// Build, write and index one archive.
pub async fn store_archive<S>(
    reader: &Reader,
    index: &S,
    archive_root: &Path,
    request: &StoreRequest,
    max_workers: usize,
) -> Result<StoreOutcome>
where
    S: IndexStore + ?Sized,
{
    if request.documents.is_empty() {
        return Err(Error::NotFound("no documents to store".to_string()));
    }

    let documents = read_documents(reader, request.documents.clone(), max_workers).await?;
    let content = compute_digest(
        documents.iter().map(|(_, data)| data),
        &request.manifest,
        &request.system,
    );

    let files: Vec<ArchiveFile> = documents
        .into_iter()
        .enumerate()
        .map(|(i, (id, data))| ArchiveFile {
            name: stored_name(i + 1, &id),
            docman: id,
            data,
        })
        .collect();

    let indexes = if request.indexes.is_empty() {
        join_identifiers(&request.documents)
    } else {
        join_identifiers(&request.indexes)
    };

    let location = archive_path(archive_root, &content.digest)?;
    let meta = MetaRecord {
        digest: content.digest.clone(),
        files_hash: content.files_hash.clone(),
        indexes,
        system: request.system.clone(),
        manifest: request.manifest.clone(),
    };
    write_archive(&location, &files, &meta).await?;

    let record = read_archive_meta(&location).await?.index_record(&location);
    index.replace_digest(&record).await?;

    info!(
        digest = %content.digest,
        location = %location.display(),
        files = files.len(),
        "archive stored"
    );

    Ok(StoreOutcome {
        digest: content.digest,
        files_hash: content.files_hash,
        location,
        identifiers: record.identifiers.into_iter().collect(),
        files: files.len(),
    })
}

/// `docvault archive store`.
pub async fn run_store(
    config: &Config,
    request: &StoreRequest,
    json: bool,
) -> anyhow::Result<()> {
    let reader = Reader::from_config(config)?;
    let index = SqliteIndex::open(config).await?;
    let outcome = store_archive(
        &reader,
        &index,
        &config.archive.root,
        request,
        config.workers.max,
    )
    .await;
    index.close().await;
    let outcome = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("store {}", outcome.digest);
    println!("  files hash: {}", outcome.files_hash);
    println!("  files: {}", outcome.files);
    println!("  location: {}", outcome.location.display());
    println!("  identifiers: {}", outcome.identifiers.join(", "));
    println!("ok");
    Ok(())
}

/// Replace the manifest of the archive for `digest` and refresh its index
/// entries. The digest itself does not change.
pub async fn update_manifest<S>(
    index: &S,
    archive_root: &Path,
    digest: &str,
    manifest: &str,
) -> Result<ArchiveRecord>
where
    S: IndexStore + ?Sized,
{
    let location = archive_path(archive_root, digest)?;
    archive::update_manifest(&location, manifest).await?;
    let record = read_archive_meta(&location).await?.index_record(&location);
    index.replace_digest(&record).await?;

    info!(digest, location = %location.display(), "manifest updated");
    Ok(record)
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub digest: String,
    /// Whether an archive directory was removed.
    pub archive_removed: bool,
    /// Index entries removed.
    pub entries_removed: u64,
}

/// Delete a digest: its archive directory and its index entries.
///
/// Deleting a digest that was never stored is not an error.
pub async fn delete_digest<S>(index: &S, archive_root: &Path, digest: &str) -> Result<DeleteOutcome>
where
    S: IndexStore + ?Sized,
{
    let location = archive_path(archive_root, digest)?;
    let archive_removed = match location.parent() {
        Some(dir) => match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::io(dir, e)),
        },
        None => false,
    };
    let entries_removed = index.delete(digest).await?;

    info!(digest, archive_removed, entries_removed, "digest deleted");
    Ok(DeleteOutcome {
        digest: digest.to_string(),
        archive_removed,
        entries_removed,
    })
}
