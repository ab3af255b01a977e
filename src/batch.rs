//! Bounded parallel batches.
//!
//! Every batch runs on a `JoinSet` with at most `workers.max` tasks doing
//! work at once, gated by a `Semaphore`. Results come back in input order.
//! The first failure aborts the remaining tasks and is returned as is, so a
//! batch never yields a partial result.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use docvault_core::digest::{combine_file_hashes, hash_reader, ContentDigest};
use docvault_core::error::{Error, Result};

use crate::reader::Reader;

/// Run `task` over `inputs` with at most `max_workers` in flight.
pub async fn run_bounded<I, T, F, Fut>(inputs: Vec<I>, max_workers: usize, task: F) -> Result<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut set = JoinSet::new();
    let total = inputs.len();

    for (index, input) in inputs.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let work = task(input);
        set.spawn(async move {
            // The semaphore is never closed, so acquiring cannot fail.
            let _permit = semaphore.acquire_owned().await;
            work.await.map(|value| (index, value))
        });
    }

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok((index, value))) => slots[index] = Some(value),
            Ok(Err(e)) => {
                set.abort_all();
                return Err(e);
            }
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => {}
        }
    }

    debug!(total, max_workers, "batch finished");
    Ok(slots.into_iter().flatten().collect())
}

/// SHA-1 of every file, in input order.
pub async fn hash_files(paths: Vec<PathBuf>, max_workers: usize) -> Result<Vec<String>> {
    run_bounded(paths, max_workers, |path| async move {
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path).map_err(|e| Error::io(&path, e))?;
            hash_reader(std::io::BufReader::new(file), &path.display().to_string())
        })
        .await
        .unwrap_or_else(|e| std::panic::resume_unwind(e.into_panic()))
    })
    .await
}

/// Digest a set of local files with a manifest and system label.
pub async fn digest_files(
    paths: Vec<PathBuf>,
    manifest: &str,
    system: &str,
    max_workers: usize,
) -> Result<ContentDigest> {
    let hashes = hash_files(paths, max_workers).await?;
    Ok(combine_file_hashes(hashes, manifest, system))
}

/// Read many documents fully. Any unreadable document fails the batch.
pub async fn read_documents(
    reader: &Reader,
    ids: Vec<String>,
    max_workers: usize,
) -> Result<Vec<(String, Vec<u8>)>> {
    run_bounded(ids, max_workers, |id| {
        let reader = reader.clone();
        async move {
            let data = reader.read(&id).await?;
            Ok((id, data))
        }
    })
    .await
}
