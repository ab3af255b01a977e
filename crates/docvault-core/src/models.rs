//! Index data models.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the index: an identifier pointing at an archive.
///
/// Several identifiers may share a digest. A digest has exactly one
/// current location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub identifier: String,
    pub digest: String,
    pub system: String,
    pub location: String,
    /// Last time the archive metadata was written.
    pub meta_time: Option<DateTime<Utc>>,
    /// Modification time of the newest file in the archive.
    pub archive_time: Option<DateTime<Utc>>,
}

/// Everything the index needs to know about one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub identifiers: BTreeSet<String>,
    pub digest: String,
    pub system: String,
    pub location: String,
    pub meta_time: Option<DateTime<Utc>>,
    pub archive_time: Option<DateTime<Utc>>,
}

impl ArchiveRecord {
    /// One entry per identifier, in identifier order.
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.identifiers
            .iter()
            .map(|identifier| IndexEntry {
                identifier: identifier.clone(),
                digest: self.digest.clone(),
                system: self.system.clone(),
                location: self.location.clone(),
                meta_time: self.meta_time,
                archive_time: self.archive_time,
            })
            .collect()
    }
}

/// Separator between identifiers in an archive's `indexes` field.
pub const INDEXES_SEPARATOR: char = '^';

/// Extract the distinct identifiers from an archive's `indexes` field.
///
/// Entries are `^`-separated and may carry `,key:value` qualifiers after
/// the identifier, which are dropped.
///
/// ```rust
/// use docvault_core::models::unique_identifiers;
///
/// let ids = unique_identifiers("c:stcv:12915850^c:stcv:12915850,iiifsys:stcv,urlty:stcv");
/// assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["c:stcv:12915850"]);
/// ```
pub fn unique_identifiers(indexes: &str) -> BTreeSet<String> {
    indexes
        .split(INDEXES_SEPARATOR)
        .filter_map(|entry| entry.split(',').next())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inverse of [`unique_identifiers`] for identifiers without qualifiers.
pub fn join_identifiers<'a, I>(identifiers: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    identifiers
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(&INDEXES_SEPARATOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_skip_empty_entries() {
        let ids = unique_identifiers("^dg:ua:9^^ tg:uact:1 ^dg:ua:9,iiifsys:uact");
        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec!["dg:ua:9".to_string(), "tg:uact:1".to_string()]
        );
        assert!(unique_identifiers("").is_empty());
    }

    #[test]
    fn entries_share_digest_and_location() {
        let record = ArchiveRecord {
            identifiers: ["b", "a"].iter().map(|s| s.to_string()).collect(),
            digest: "e1e53b3d".to_string(),
            system: "uact".to_string(),
            location: "/archives/db.sqlite".to_string(),
            meta_time: None,
            archive_time: None,
        };
        let entries = record.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].identifier, "a");
        assert!(entries.iter().all(|e| e.digest == "e1e53b3d"));
        assert_eq!(join_identifiers(&record.identifiers), "a^b");
    }
}
