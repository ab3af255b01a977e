//! Content digests for archives.
//!
//! An archive is named by a digest over its files, its manifest, and the
//! system it belongs to. All hashes are lowercase hex SHA-1.
//!
//! # Algorithm
//!
//! 1. Hash every file's content.
//! 2. Sort the file hashes in ascending byte order.
//! 3. Hash the concatenated sorted hashes → `files_hash`.
//! 4. Hash the manifest text → `manifest_hash`.
//! 5. Hash `system + files_hash + manifest_hash` → `digest`.
//!
//! Sorting makes the digest independent of file order. Any change to a
//! file's bytes, the manifest, or the system label changes it.

use std::io::Read;

use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// Result of [`compute_digest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentDigest {
    /// Hash over the sorted per-file hashes. Stored in the archive as a
    /// consistency token.
    pub files_hash: String,
    /// The archive's content identifier.
    pub digest: String,
}

/// Lowercase hex SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    format!("{:x}", Sha1::digest(data))
}

/// Hash a reader to EOF.
///
/// Any read error fails the whole hash. `context` names the source in the
/// error (an identifier or a path).
pub fn hash_reader<R: Read>(mut reader: R, context: &str) -> Result<String> {
    let mut hasher = Sha1::new();
    std::io::copy(&mut reader, &mut hasher).map_err(|source| Error::Read {
        context: context.to_string(),
        source,
    })?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute the digest of in-memory file contents.
///
/// ```rust
/// use docvault_core::digest::compute_digest;
///
/// let a = compute_digest(["abc", "def"], "{}", "sys");
/// let b = compute_digest(["def", "abc"], "{}", "sys");
/// assert_eq!(a, b);
/// ```
pub fn compute_digest<I, B>(files: I, manifest: &str, system: &str) -> ContentDigest
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let hashes = files
        .into_iter()
        .map(|content| sha1_hex(content.as_ref()))
        .collect();
    combine_file_hashes(hashes, manifest, system)
}

/// Steps 2–5 of the algorithm, starting from per-file hashes computed
/// elsewhere (for example by a parallel batch).
pub fn combine_file_hashes(
    mut file_hashes: Vec<String>,
    manifest: &str,
    system: &str,
) -> ContentDigest {
    file_hashes.sort_unstable();
    let files_hash = sha1_hex(file_hashes.concat().as_bytes());
    let manifest_hash = sha1_hex(manifest.as_bytes());
    let digest = sha1_hex(format!("{system}{files_hash}{manifest_hash}").as_bytes());
    ContentDigest { files_hash, digest }
}
