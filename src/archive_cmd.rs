//! `docvault archive inspect`.

use anyhow::Result;
use serde::Serialize;

use crate::archive::{archive_path, list_archive_files, read_archive_meta, ArchiveMeta, StoredFile};
use crate::config::Config;

#[derive(Debug, Serialize)]
pub struct Inspection {
    pub location: String,
    #[serde(flatten)]
    pub meta: ArchiveMeta,
    pub files: Vec<StoredFile>,
}

/// Read an archive's meta row and file listing.
pub async fn inspect(config: &Config, digest: &str) -> Result<Inspection> {
    let path = archive_path(&config.archive.root, digest)?;
    let meta = read_archive_meta(&path).await?;
    let files = list_archive_files(&path).await?;
    Ok(Inspection {
        location: path.display().to_string(),
        meta,
        files,
    })
}

pub async fn run_inspect(config: &Config, digest: &str, json: bool) -> Result<()> {
    let inspection = inspect(config, digest).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
        return Ok(());
    }

    let record = &inspection.meta.record;
    println!("archive {}", inspection.location);
    println!("  digest: {}", record.digest);
    println!("  files hash: {}", record.files_hash);
    println!("  system: {}", record.system);
    println!("  indexes: {}", record.indexes);
    if let Some(ts) = inspection.meta.meta_time {
        println!("  meta: {}", ts.format("%Y-%m-%dT%H:%M:%SZ"));
    }
    if let Some(ts) = inspection.meta.archive_time {
        println!("  archive: {}", ts.format("%Y-%m-%dT%H:%M:%SZ"));
    }
    println!("  files: {}", inspection.files.len());
    for file in &inspection.files {
        println!(
            "    {}  {} bytes  {}",
            file.name,
            file.size,
            file.docman.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
