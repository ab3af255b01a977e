//! Resolving identifiers to files under the storage root.
//!
//! ```text
//! {root}/{database}/__shadow__      optional marker naming an overlay database
//! {root}/{shadow}/{dir1}/{dir2}/{basename}   tried first when a marker exists
//! {root}/{database}/{dir1}/{dir2}/{basename} primary location
//! ```
//!
//! Each candidate path goes through a [`LocateStrategy`]. The default,
//! [`ExactThenGlobSuffix`], accepts the path itself or a sibling named
//! `<basename>.<suffix>` so renamed or soft-deleted files (for example
//! `ffcextrafile.html.rm20220313`) still resolve.
//!
//! Resolution only reads. It never creates files or directories.

use std::io;
use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use serde::Serialize;
use tracing::{debug, warn};

use docvault_core::error::{Error, Result};
use docvault_core::identifier::ParsedId;

/// Name of the shadow marker inside a database directory.
pub const SHADOW_MARKER: &str = "__shadow__";

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "match", content = "path", rename_all = "lowercase")]
pub enum Resolved {
    /// The computed path exists as is.
    Exact(PathBuf),
    /// A sibling with an extra suffix matched.
    Glob(PathBuf),
}

impl Resolved {
    pub fn path(&self) -> &Path {
        match self {
            Resolved::Exact(path) | Resolved::Glob(path) => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Resolved::Exact(path) | Resolved::Glob(path) => path,
        }
    }
}

/// How a single computed path is matched against the filesystem.
pub trait LocateStrategy: Send + Sync {
    fn locate(&self, path: &Path) -> Result<Option<Resolved>>;
}

/// Exact regular file first, then the first `<basename>.*` sibling in
/// ascending name order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactThenGlobSuffix;

impl LocateStrategy for ExactThenGlobSuffix {
    fn locate(&self, path: &Path) -> Result<Option<Resolved>> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => return Ok(Some(Resolved::Exact(path.to_path_buf()))),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(path, e)),
        }

        let (Some(parent), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
        else {
            return Ok(None);
        };

        let pattern = format!("{}.*", escape_glob(name));
        let matcher = GlobBuilder::new(&pattern)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|e| Error::io(path, io::Error::new(io::ErrorKind::InvalidInput, e)))?
            .compile_matcher();

        let entries = match std::fs::read_dir(parent) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(parent, e)),
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(parent, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !matcher.is_match(file_name) {
                continue;
            }
            let candidate = entry.path();
            if candidate.is_file() {
                candidates.push(candidate);
            }
        }

        candidates.sort();
        Ok(candidates.into_iter().next().map(Resolved::Glob))
    }
}

fn escape_glob(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | '*' | '?' | '[' | ']' | '{' | '}') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Resolves identifiers against one storage root.
#[derive(Debug, Clone)]
pub struct Locator<S = ExactThenGlobSuffix> {
    root: PathBuf,
    strategy: S,
}

impl Locator<ExactThenGlobSuffix> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_strategy(root, ExactThenGlobSuffix)
    }
}

impl<S: LocateStrategy> Locator<S> {
    pub fn with_strategy(root: impl Into<PathBuf>, strategy: S) -> Self {
        Self {
            root: root.into(),
            strategy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the document would be stored, whether or not it exists.
    pub fn primary_path(&self, id: &str) -> Result<PathBuf> {
        Ok(ParsedId::parse(id)?.primary_path(&self.root))
    }

    /// The overlay database named by `database`'s shadow marker.
    ///
    /// A missing, unreadable, or blank marker means no overlay.
    pub fn shadow_database(&self, database: &str) -> Option<String> {
        let marker = self.root.join(database).join(SHADOW_MARKER);
        let content = match std::fs::read_to_string(&marker) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(marker = %marker.display(), error = %e, "ignoring unreadable shadow marker");
                return None;
            }
        };
        let shadow = content.trim();
        if shadow.is_empty() {
            return None;
        }
        if shadow.contains(['/', '\\']) || shadow == "." || shadow == ".." {
            warn!(marker = %marker.display(), shadow, "ignoring shadow marker with a path in it");
            return None;
        }
        Some(shadow.to_string())
    }

    /// Resolve an identifier. `Ok(None)` means neither the shadow nor the
    /// primary location holds the document.
    pub fn resolve(&self, id: &str) -> Result<Option<Resolved>> {
        let parsed = ParsedId::parse(id)?;

        if let Some(shadow) = self.shadow_database(parsed.database()) {
            let shadow_path = parsed.path_in(&self.root, &shadow);
            debug!(id, shadow = %shadow, path = %shadow_path.display(), "trying shadow database");
            if let Some(found) = self.strategy.locate(&shadow_path)? {
                return Ok(Some(found));
            }
        }

        let primary = parsed.primary_path(&self.root);
        debug!(id, path = %primary.display(), "trying primary location");
        self.strategy.locate(&primary)
    }
}
