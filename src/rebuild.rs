//! Rebuilding the index from the archives on disk.
//!
//! Walks the archive root for `db.sqlite` containers, reads each archive's
//! `meta` row, and replaces the whole index in one step. Archives whose
//! metadata cannot be read are skipped with a warning and counted; they
//! never abort the rebuild. Walk order is sorted, so two rebuilds over the
//! same archives produce the same index.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use docvault_core::error::{Error, Result};
use docvault_core::models::ArchiveRecord;
use docvault_core::shard::ARCHIVE_FILE_NAME;
use docvault_core::store::IndexStore;

use crate::archive::read_archive_meta;
use crate::batch::run_bounded;
use crate::progress::{RebuildProgressEvent, RebuildProgressReporter};

/// Archives read per progress report.
const READ_CHUNK: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildStats {
    /// Archives indexed.
    pub archives: u64,
    /// Index entries written.
    pub entries: u64,
    /// Archives skipped because their metadata was unreadable.
    pub skipped: u64,
}

/// All archive containers under `root`, in path order.
pub fn discover_archives(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::NotFound(root.display().to_string()));
    }

    let mut archives = Vec::new();
    let walker = WalkDir::new(root).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, e.into())
        })?;
        if entry.file_type().is_file() && entry.file_name() == ARCHIVE_FILE_NAME {
            archives.push(entry.into_path());
        }
    }
    Ok(archives)
}

/// Index record for one archive, or `None` when it has to be skipped.
pub async fn archive_record(path: PathBuf) -> Result<Option<ArchiveRecord>> {
    let meta = match read_archive_meta(&path).await {
        Ok(meta) => meta,
        Err(Error::Archive { path, reason }) => {
            warn!(archive = %path.display(), %reason, "skipping archive");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    if meta.record.digest.is_empty() {
        warn!(archive = %path.display(), "skipping archive without digest");
        return Ok(None);
    }
    Ok(Some(meta.index_record(&path)))
}

/// Replace the index with what the archives under `root` say.
pub async fn rebuild<S>(
    store: &S,
    root: &Path,
    max_workers: usize,
    reporter: &dyn RebuildProgressReporter,
) -> Result<RebuildStats>
where
    S: IndexStore + ?Sized,
{
    reporter.report(RebuildProgressEvent::Discovering {
        root: root.display().to_string(),
    });
    let owned_root = root.to_path_buf();
    let paths = tokio::task::spawn_blocking(move || discover_archives(&owned_root))
        .await
        .map_err(|e| Error::io(root, std::io::Error::other(e)))??;

    let total = paths.len() as u64;
    let mut records = Vec::with_capacity(paths.len());
    let mut stats = RebuildStats::default();
    let mut done = 0u64;

    for chunk in paths.chunks(READ_CHUNK) {
        let read = run_bounded(chunk.to_vec(), max_workers, archive_record).await?;
        done += read.len() as u64;
        for record in read {
            match record {
                Some(record) => records.push(record),
                None => stats.skipped += 1,
            }
        }
        reporter.report(RebuildProgressEvent::Reading { n: done, total });
    }

    let planned: u64 = records.iter().map(|r| r.identifiers.len() as u64).sum();
    reporter.report(RebuildProgressEvent::Writing { entries: planned });

    stats.entries = store.replace_all(&records).await?;
    stats.archives = records.len() as u64;
    info!(
        archives = stats.archives,
        entries = stats.entries,
        skipped = stats.skipped,
        "index rebuilt"
    );
    Ok(stats)
}
