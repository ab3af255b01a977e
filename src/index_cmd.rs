//! `docvault index` commands.

use anyhow::Result;

use docvault_core::store::IndexStore;

use crate::config::Config;
use crate::progress::ProgressMode;
use crate::rebuild::rebuild;
use crate::sqlite_store::SqliteIndex;

pub async fn run_rebuild(config: &Config, progress: ProgressMode) -> Result<()> {
    let index = SqliteIndex::open(config).await?;
    let reporter = progress.reporter();
    let stats = rebuild(
        &index,
        &config.archive.root,
        config.workers.max,
        reporter.as_ref(),
    )
    .await;
    index.close().await;
    let stats = stats?;

    println!("rebuild {}", config.archive.root.display());
    println!("  archives: {}", stats.archives);
    println!("  entries: {}", stats.entries);
    println!("  skipped: {}", stats.skipped);
    println!("ok");
    Ok(())
}

pub async fn run_lookup(config: &Config, identifier: &str) -> Result<()> {
    let index = SqliteIndex::open(config).await?;
    let digest = index.lookup(identifier).await;
    index.close().await;

    if let Some(digest) = digest? {
        println!("{}", digest);
    }
    Ok(())
}

pub async fn run_search(config: &Config, term: &str, json: bool) -> Result<()> {
    let index = SqliteIndex::open(config).await?;
    let entries = index.search(term).await;
    index.close().await;
    let entries = entries?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }

    for entry in &entries {
        println!("{}  {}  {}", entry.identifier, entry.digest, entry.system);
        println!("    location: {}", entry.location);
        if let Some(ts) = entry.meta_time {
            println!("    meta: {}", ts.format("%Y-%m-%dT%H:%M:%SZ"));
        }
        if let Some(ts) = entry.archive_time {
            println!("    archive: {}", ts.format("%Y-%m-%dT%H:%M:%SZ"));
        }
    }
    Ok(())
}
