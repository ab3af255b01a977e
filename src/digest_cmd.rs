//! `docvault digest` commands.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::archive::{archive_path, read_archive_file, read_archive_meta};
use crate::batch::digest_files;
use crate::config::Config;
use crate::id_cmd::open_output;
use crate::ingest::{delete_digest, update_manifest};
use crate::sqlite_store::SqliteIndex;

/// Length of a digest in hex characters.
pub const DIGEST_LEN: usize = 40;

/// Split a harvest code into digest and stored file name.
///
/// ```rust
/// use docvault::digest_cmd::split_harvest_code;
///
/// let (digest, name) =
///     split_harvest_code("e1e53b3d6b74c2e7ed0615ec687e68fdb61de24200000001.jp2").unwrap();
/// assert_eq!(digest, "e1e53b3d6b74c2e7ed0615ec687e68fdb61de242");
/// assert_eq!(name, "00000001.jp2");
/// ```
pub fn split_harvest_code(code: &str) -> Result<(&str, &str)> {
    if code.len() <= DIGEST_LEN || !code.is_char_boundary(DIGEST_LEN) {
        bail!("harvest code `{}` is too short", code);
    }
    let (digest, name) = code.split_at(DIGEST_LEN);
    if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("harvest code `{}` does not start with a digest", code);
    }
    Ok((digest, name))
}

pub fn run_location(config: &Config, digest: &str) -> Result<()> {
    println!("{}", archive_path(&config.archive.root, digest)?.display());
    Ok(())
}

pub async fn run_manifest(config: &Config, digest: &str, set: Option<&Path>) -> Result<()> {
    if let Some(source) = set {
        let manifest = read_manifest(source)?;
        let index = SqliteIndex::open(config).await?;
        let record = update_manifest(&index, &config.archive.root, digest, &manifest).await;
        index.close().await;
        let record = record?;
        println!("manifest updated: {}", digest);
        println!("  index entries: {}", record.identifiers.len());
        return Ok(());
    }
    let path = archive_path(&config.archive.root, digest)?;
    let meta = read_archive_meta(&path).await?;
    println!("{}", meta.record.manifest);
    Ok(())
}

pub async fn run_harvest(config: &Config, code: &str, output: Option<&Path>) -> Result<()> {
    let (digest, name) = split_harvest_code(code)?;
    let path = archive_path(&config.archive.root, digest)?;
    let data = read_archive_file(&path, name).await?;

    let mut out = open_output(output).await?;
    out.write_all(&data).await?;
    out.flush().await?;
    Ok(())
}

pub async fn run_delete(config: &Config, digest: &str) -> Result<()> {
    let index = SqliteIndex::open(config).await?;
    let outcome = delete_digest(&index, &config.archive.root, digest).await;
    index.close().await;
    let outcome = outcome?;

    println!("delete {}", outcome.digest);
    println!("  archive removed: {}", outcome.archive_removed);
    println!("  index entries removed: {}", outcome.entries_removed);
    println!("ok");
    Ok(())
}

/// Manifest text exactly as stored in the file. It is hashed byte for byte,
/// so it is not trimmed or reformatted.
pub fn read_manifest(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))
}

pub async fn run_compute(
    max_workers: usize,
    files: Vec<PathBuf>,
    manifest: Option<&Path>,
    system: &str,
    json: bool,
) -> Result<()> {
    let manifest = match manifest {
        Some(path) => read_manifest(path)?,
        None => String::new(),
    };
    let content = digest_files(files, &manifest, system, max_workers).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&content)?);
    } else {
        println!("filesHash: {}", content.files_hash);
        println!("digest: {}", content.digest);
    }
    Ok(())
}
