//! `docvault id` commands: database, location, and contents of a document.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::io::AsyncWrite;

use docvault_core::identifier::database_of;

use crate::config::Config;
use crate::reader::Reader;

/// Where command output goes: a file, or stdout when `output` is `None`.
pub async fn open_output(output: Option<&Path>) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match output {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

pub fn run_db(id: &str) -> Result<()> {
    match database_of(id) {
        Some(database) => {
            println!("{}", database);
            Ok(())
        }
        None => bail!("identifier `{}` has no database", id),
    }
}

/// Print the resolved path. Returns `false` when nothing was found.
pub async fn run_locate(config: &Config, id: &str, json: bool) -> Result<bool> {
    let reader = Reader::from_config(config)?;
    let resolved = reader.resolve(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(resolved.is_some());
    }

    match resolved {
        Some(found) => {
            println!("{}", found.path().display());
            Ok(true)
        }
        None => Ok(false),
    }
}

pub async fn run_fetch(config: &Config, id: &str, output: Option<&Path>) -> Result<()> {
    let reader = Reader::from_config(config)?;
    let stream = reader.open(id).await?;
    let origin = stream.origin();

    let mut out = open_output(output).await?;
    let bytes = stream.copy_to(&mut out).await?;
    tracing::info!(id, origin = %origin, bytes, "document fetched");
    Ok(())
}
