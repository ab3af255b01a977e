//! Opening documents for reading, with an optional remote fallback.
//!
//! The reader first resolves the identifier locally. When nothing is found
//! and `[storage].remote_url` is set, it asks the remote docman for
//! `{remote_url}/docman{id}`. A document missing in both places is
//! [`Error::NotFound`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use docvault_core::error::{Error, Result};
use docvault_core::identifier::{sniff_syntax, strip_routing_prefix, Syntax};

use crate::config::Config;
use crate::locate::{Locator, Resolved};

/// An open document, local or remote.
#[derive(Debug)]
pub enum DocumentStream {
    Local {
        path: PathBuf,
        file: tokio::fs::File,
    },
    Remote {
        url: String,
        response: reqwest::Response,
    },
}

impl DocumentStream {
    /// Where the bytes come from: a path or a URL.
    pub fn origin(&self) -> String {
        match self {
            DocumentStream::Local { path, .. } => path.display().to_string(),
            DocumentStream::Remote { url, .. } => url.clone(),
        }
    }

    /// Read the whole document. A read that fails midway is an error.
    pub async fn read_to_end(self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.copy_to(&mut buf).await?;
        Ok(buf)
    }

    /// Stream the document into `out` and return the number of bytes copied.
    ///
    /// A failing source is [`Error::Read`] (or [`Error::Remote`]); a failing
    /// `out` is [`Error::Write`].
    pub async fn copy_to<W>(self, out: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let dest = format!("output of {}", self.origin());
        let write_error = |source: std::io::Error| Error::Write {
            context: dest.clone(),
            source,
        };
        let mut total = 0u64;
        match self {
            DocumentStream::Local { path, mut file } => {
                let mut buf = vec![0u8; 64 * 1024];
                loop {
                    let n = file.read(&mut buf).await.map_err(|source| Error::Read {
                        context: path.display().to_string(),
                        source,
                    })?;
                    if n == 0 {
                        break;
                    }
                    out.write_all(&buf[..n]).await.map_err(write_error)?;
                    total += n as u64;
                }
            }
            DocumentStream::Remote { url, mut response } => {
                while let Some(chunk) = response
                    .chunk()
                    .await
                    .map_err(|e| Error::Remote(format!("{url}: {e}")))?
                {
                    out.write_all(&chunk).await.map_err(write_error)?;
                    total += chunk.len() as u64;
                }
            }
        }
        out.flush().await.map_err(write_error)?;
        Ok(total)
    }
}

/// A configured remote docman.
#[derive(Clone)]
pub struct RemoteSource {
    base: String,
    client: reqwest::Client,
}

impl RemoteSource {
    pub fn new(base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base: base.to_string(),
            client,
        })
    }

    /// URL of a document on the remote docman.
    pub fn url_for(&self, id: &str) -> String {
        remote_url(&self.base, id)
    }

    async fn fetch(&self, id: &str) -> Result<DocumentStream> {
        let url = self.url_for(id);
        debug!(id, url = %url, "fetching from remote");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Remote(format!("{url}: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(id.to_string()));
        }
        if !status.is_success() {
            return Err(Error::Remote(format!("{url}: HTTP {status}")));
        }
        Ok(DocumentStream::Remote { url, response })
    }
}

/// Build the remote URL for an identifier.
///
/// A base without a scheme gets `https://`. Legacy identifiers get a `/`
/// after `docman`.
///
/// ```rust
/// use docvault::reader::remote_url;
///
/// assert_eq!(
///     remote_url("docs.example.org/", "/misc/fedb67/3.jpg"),
///     "https://docs.example.org/docman/misc/fedb67/3.jpg"
/// );
/// ```
pub fn remote_url(base: &str, id: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let base = if base.contains("://") {
        base.to_string()
    } else {
        format!("https://{base}")
    };
    let ids = strip_routing_prefix(id);
    match sniff_syntax(ids) {
        Syntax::Current => format!("{base}/docman{ids}"),
        Syntax::Legacy => format!("{base}/docman/{ids}"),
    }
}

/// Opens documents by identifier.
#[derive(Clone)]
pub struct Reader {
    locator: Arc<Locator>,
    remote: Option<RemoteSource>,
}

impl Reader {
    pub fn new(locator: Locator, remote: Option<RemoteSource>) -> Self {
        Self {
            locator: Arc::new(locator),
            remote,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let remote = match config.storage.remote() {
            Some(base) => Some(RemoteSource::new(
                base,
                Duration::from_secs(config.workers.remote_timeout_secs),
            )?),
            None => None,
        };
        Ok(Self::new(Locator::new(&config.storage.root), remote))
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Resolve on a blocking thread.
    pub async fn resolve(&self, id: &str) -> Result<Option<Resolved>> {
        let locator = Arc::clone(&self.locator);
        let owned = id.to_string();
        tokio::task::spawn_blocking(move || locator.resolve(&owned))
            .await
            .map_err(|e| Error::io(self.locator.root(), std::io::Error::other(e)))?
    }

    /// Open a document: local file first, then the remote docman.
    ///
    /// A local file that resolves but cannot be opened also falls back to
    /// the remote docman when one is configured.
    pub async fn open(&self, id: &str) -> Result<DocumentStream> {
        let local = self.resolve(id).await?.map(Resolved::into_path);
        self.open_resolved(id, local).await
    }

    async fn open_resolved(&self, id: &str, local: Option<PathBuf>) -> Result<DocumentStream> {
        if let Some(path) = local {
            debug!(id, path = %path.display(), "reading local document");
            match tokio::fs::File::open(&path).await {
                Ok(file) => return Ok(DocumentStream::Local { path, file }),
                Err(e) if self.remote.is_some() => {
                    warn!(id, path = %path.display(), error = %e, "cannot open local document, trying remote");
                }
                Err(e) => return Err(Error::io(&path, e)),
            }
        }

        match &self.remote {
            Some(remote) => remote.fetch(id).await,
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    /// Read a whole document into memory.
    pub async fn read(&self, id: &str) -> Result<Vec<u8>> {
        self.open(id).await?.read_to_end().await
    }
}
