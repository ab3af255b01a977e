//! Document identifier parsing.
//!
//! Two syntaxes are in use, told apart by a leading `/` once the routing
//! prefix has been stripped:
//!
//! ```text
//! legacy   database.dir1.dir2.rest-of-name
//! current  /database/basename              shard from md5(basename)
//!          /database/HHHxxx/basename       shard from explicit hex fragment
//! ```
//!
//! A legacy identifier keeps the *whole* identifier as its basename. That
//! differs from the current syntax but is what the stored documents use, so
//! the parser keeps it.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::shard::ShardKey;

/// Routing prefix that may precede an identifier. Only `/docman` is
/// stripped; the trailing `/` stays part of the identifier.
pub const ROUTING_PREFIX: &str = "/docman/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    Legacy,
    Current,
}

/// An identifier split into the parts needed to build a storage path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "syntax", rename_all = "lowercase")]
pub enum ParsedId {
    Legacy {
        database: String,
        dir1: String,
        dir2: String,
        basename: String,
    },
    Current {
        database: String,
        shard: ShardKey,
        basename: String,
    },
}

/// Remove the `/docman` routing prefix, if present.
///
/// ```rust
/// use docvault_core::identifier::strip_routing_prefix;
///
/// assert_eq!(strip_routing_prefix("/docman/misc/fddffc/a.html"), "/misc/fddffc/a.html");
/// assert_eq!(strip_routing_prefix("/misc/fddffc/a.html"), "/misc/fddffc/a.html");
/// ```
pub fn strip_routing_prefix(id: &str) -> &str {
    if id.starts_with(ROUTING_PREFIX) {
        &id[ROUTING_PREFIX.len() - 1..]
    } else {
        id
    }
}

/// Detect which syntax an identifier uses.
pub fn sniff_syntax(id: &str) -> Syntax {
    if strip_routing_prefix(id).starts_with('/') {
        Syntax::Current
    } else {
        Syntax::Legacy
    }
}

/// The database an identifier points into, without validating the rest.
///
/// Returns `None` when the identifier has no database segment.
pub fn database_of(id: &str) -> Option<&str> {
    let ids = strip_routing_prefix(id);
    let part = match sniff_syntax(ids) {
        Syntax::Current => ids.split('/').nth(1),
        Syntax::Legacy => ids.split('.').next(),
    };
    part.filter(|p| !p.is_empty())
}

impl ParsedId {
    /// Parse an identifier in either syntax.
    pub fn parse(id: &str) -> Result<Self> {
        let ids = strip_routing_prefix(id);
        match sniff_syntax(ids) {
            Syntax::Current => parse_current(id, ids),
            Syntax::Legacy => parse_legacy(id, ids),
        }
    }

    pub fn syntax(&self) -> Syntax {
        match self {
            ParsedId::Legacy { .. } => Syntax::Legacy,
            ParsedId::Current { .. } => Syntax::Current,
        }
    }

    pub fn database(&self) -> &str {
        match self {
            ParsedId::Legacy { database, .. } | ParsedId::Current { database, .. } => database,
        }
    }

    /// The `(dir1, dir2)` pair.
    pub fn shard_dirs(&self) -> (&str, &str) {
        match self {
            ParsedId::Legacy { dir1, dir2, .. } => (dir1, dir2),
            ParsedId::Current { shard, .. } => (&shard.dir1, &shard.dir2),
        }
    }

    /// File name as stored on disk.
    pub fn basename(&self) -> &str {
        match self {
            ParsedId::Legacy { basename, .. } | ParsedId::Current { basename, .. } => basename,
        }
    }

    /// `{root}/{database}/{dir1}/{dir2}/{basename}`.
    ///
    /// `database` is passed separately so the same parts can be placed in a
    /// shadow database.
    pub fn path_in(&self, root: &Path, database: &str) -> PathBuf {
        let (dir1, dir2) = self.shard_dirs();
        root.join(database)
            .join(dir1)
            .join(dir2)
            .join(self.basename())
    }

    /// Path inside the identifier's own database.
    pub fn primary_path(&self, root: &Path) -> PathBuf {
        self.path_in(root, self.database())
    }
}

fn parse_current(id: &str, ids: &str) -> Result<ParsedId> {
    let parts: Vec<&str> = ids.split('/').collect();
    if parts.len() < 3 {
        return Err(Error::malformed(id, "expected /database/basename"));
    }
    let database = check_component(id, "database", parts[1])?;
    let basename = check_component(id, "basename", parts[parts.len() - 1])?;

    let (shard, basename) = if parts.len() == 3 {
        (ShardKey::from_basename(basename), basename.to_string())
    } else {
        ShardKey::from_explicit(id, parts[2], basename)?
    };

    Ok(ParsedId::Current {
        database: database.to_string(),
        shard,
        basename,
    })
}

fn parse_legacy(id: &str, ids: &str) -> Result<ParsedId> {
    let parts: Vec<&str> = ids.split('.').collect();
    if parts.len() < 3 {
        return Err(Error::malformed(id, "expected database.dir1.dir2"));
    }
    Ok(ParsedId::Legacy {
        database: check_component(id, "database", parts[0])?.to_string(),
        dir1: check_component(id, "dir1", parts[1])?.to_string(),
        dir2: check_component(id, "dir2", parts[2])?.to_string(),
        basename: check_component(id, "basename", ids)?.to_string(),
    })
}

fn check_component<'a>(id: &str, what: &str, value: &'a str) -> Result<&'a str> {
    match value {
        "" => Err(Error::malformed(id, format!("empty {what}"))),
        "." | ".." => Err(Error::malformed(id, format!("{what} may not be `{value}`"))),
        _ if value.contains(['/', '\\']) => Err(Error::malformed(
            id,
            format!("{what} may not contain a path separator"),
        )),
        _ => Ok(value),
    }
}
