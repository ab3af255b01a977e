//! Two-level directory sharding.
//!
//! Documents live at `{root}/{database}/{dir1}/{dir2}/{basename}`. The
//! directory pair keeps per-directory file counts bounded and is derived in
//! one of two ways:
//!
//! | Source | `dir1` | `dir2` | Stored basename |
//! |--------|--------|--------|-----------------|
//! | MD5 of the basename (`h`) | `"y" + h[0..1]` | `h[1..3]` | unchanged |
//! | Explicit hex fragment (`H`) | `"x" + H[0..1]` | `H[1..3]` | `H[3..] + basename` |
//!
//! Archives use a different scheme keyed by the reversed digest; see
//! [`archive_relative_path`].
//!
//! Both derivations are pure functions of their inputs. The layout they
//! produce is already on disk and must not change.

use std::path::PathBuf;

use md5::{Digest, Md5};
use serde::Serialize;

use crate::error::{Error, Result};

/// File name of the archive container inside its digest directory.
pub const ARCHIVE_FILE_NAME: &str = "db.sqlite";

/// A `(dir1, dir2)` directory pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ShardKey {
    pub dir1: String,
    pub dir2: String,
}

impl ShardKey {
    /// Derive the shard from the lowercase hex MD5 of `basename`.
    ///
    /// ```rust
    /// use docvault_core::shard::ShardKey;
    ///
    /// let key = ShardKey::from_basename("extrafile.html");
    /// assert_eq!(key.dir1, "y6");
    /// assert_eq!(key.dir2, "ae");
    /// ```
    pub fn from_basename(basename: &str) -> Self {
        let hex = format!("{:x}", Md5::digest(basename.as_bytes()));
        ShardKey {
            dir1: format!("y{}", &hex[0..1]),
            dir2: hex[1..3].to_string(),
        }
    }

    /// Derive the shard from an explicit hex fragment carried in the
    /// identifier. Returns the key and the rewritten basename, which gets
    /// the fragment's remaining characters prepended.
    ///
    /// The fragment must be at least three ASCII characters. `id` is only
    /// used for the error message.
    pub fn from_explicit(id: &str, fragment: &str, basename: &str) -> Result<(Self, String)> {
        if fragment.len() < 3 || !fragment.is_ascii() {
            return Err(Error::malformed(
                id,
                format!("shard fragment `{fragment}` must be at least 3 ASCII characters"),
            ));
        }
        let key = ShardKey {
            dir1: format!("x{}", &fragment[0..1]),
            dir2: fragment[1..3].to_string(),
        };
        Ok((key, format!("{}{}", &fragment[3..], basename)))
    }
}

/// Path of an archive relative to the archive root.
///
/// The digest is reversed so that the leading directories spread evenly:
/// `rev[0..2]/rev[2..4]/rev/db.sqlite`.
///
/// ```rust
/// use docvault_core::shard::archive_relative_path;
///
/// let path = archive_relative_path("e1e53b3d6b74c2e7ed0615ec687e68fdb61de242").unwrap();
/// assert_eq!(
///     path.to_str().unwrap(),
///     "24/2e/242ed16bdf86e786ce5160de7e2c47b6d3b35e1e/db.sqlite"
/// );
/// ```
pub fn archive_relative_path(digest: &str) -> Result<PathBuf> {
    if digest.len() < 4 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::malformed(
            digest,
            "digest must be at least 4 hexadecimal characters",
        ));
    }
    let reversed: String = digest.chars().rev().collect();
    Ok(PathBuf::from(&reversed[0..2])
        .join(&reversed[2..4])
        .join(&reversed)
        .join(ARCHIVE_FILE_NAME))
}
