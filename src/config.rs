use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub archive: ArchiveConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Document storage root, e.g. `/library/database/docman`.
    pub root: PathBuf,
    /// Base URL of a remote docman for reads that miss locally.
    #[serde(default)]
    pub remote_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkersConfig {
    #[serde(default = "default_max_workers")]
    pub max: usize,
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            max: default_max_workers(),
            remote_timeout_secs: default_remote_timeout_secs(),
        }
    }
}

fn default_max_workers() -> usize {
    8
}
fn default_remote_timeout_secs() -> u64 {
    30
}

impl StorageConfig {
    /// The remote base URL, ignoring blank values.
    pub fn remote(&self) -> Option<&str> {
        self.remote_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate roots
    if config.storage.root.as_os_str().is_empty() {
        anyhow::bail!("storage.root must not be empty");
    }
    if config.archive.root.as_os_str().is_empty() {
        anyhow::bail!("archive.root must not be empty");
    }
    if config.index.path.as_os_str().is_empty() {
        anyhow::bail!("index.path must not be empty");
    }

    // Validate workers
    if config.workers.max == 0 {
        anyhow::bail!("workers.max must be >= 1");
    }
    if config.workers.remote_timeout_secs == 0 {
        anyhow::bail!("workers.remote_timeout_secs must be >= 1");
    }

    Ok(config)
}
