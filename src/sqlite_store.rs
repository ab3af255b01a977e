//! SQLite-backed [`IndexStore`] implementation.
//!
//! One row per identifier in `index_entries`. Timestamps are stored as
//! RFC 3339 text so the file stays readable with the `sqlite3` shell.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use docvault_core::error::{Error, Result};
use docvault_core::models::{ArchiveRecord, IndexEntry};
use docvault_core::store::IndexStore;

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`IndexStore`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the configured index, creating the schema if needed.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn unavailable(err: sqlx::Error) -> Error {
    Error::StorageUnavailable(err.to_string())
}

fn format_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|dt| dt.to_rfc3339())
}

fn parse_ts(text: Option<String>) -> Option<DateTime<Utc>> {
    text.and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

const UPSERT_SQL: &str = r#"
    INSERT INTO index_entries (identifier, digest, system, location, meta_time, archive_time)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT(identifier) DO UPDATE SET
        digest = excluded.digest,
        system = excluded.system,
        location = excluded.location,
        meta_time = excluded.meta_time,
        archive_time = excluded.archive_time
"#;

async fn insert_record<'e, E>(executor: E, entry: &IndexEntry) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(UPSERT_SQL)
        .bind(&entry.identifier)
        .bind(&entry.digest)
        .bind(&entry.system)
        .bind(&entry.location)
        .bind(format_ts(entry.meta_time))
        .bind(format_ts(entry.archive_time))
        .execute(executor)
        .await
        .map_err(unavailable)?;
    Ok(())
}

#[async_trait]
impl IndexStore for SqliteIndex {
    async fn upsert(&self, record: &ArchiveRecord) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        for entry in record.entries() {
            insert_record(&mut *tx, &entry).await?;
        }
        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }

    async fn lookup(&self, identifier: &str) -> Result<Option<String>> {
        let digest: Option<String> =
            sqlx::query_scalar("SELECT digest FROM index_entries WHERE identifier = ?")
                .bind(identifier)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;
        Ok(digest)
    }

    async fn search(&self, term: &str) -> Result<Vec<IndexEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT identifier, digest, system, location, meta_time, archive_time
            FROM index_entries
            WHERE identifier = ? OR digest = ?
            ORDER BY identifier
            "#,
        )
        .bind(term)
        .bind(term)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .iter()
            .map(|row| IndexEntry {
                identifier: row.get("identifier"),
                digest: row.get("digest"),
                system: row.get("system"),
                location: row.get("location"),
                meta_time: parse_ts(row.get("meta_time")),
                archive_time: parse_ts(row.get("archive_time")),
            })
            .collect())
    }

    async fn delete(&self, digest: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM index_entries WHERE digest = ?")
            .bind(digest)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected())
    }

    async fn replace_digest(&self, record: &ArchiveRecord) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        let removed = sqlx::query("DELETE FROM index_entries WHERE digest = ?")
            .bind(&record.digest)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?
            .rows_affected();
        for entry in record.entries() {
            insert_record(&mut *tx, &entry).await?;
        }
        tx.commit().await.map_err(unavailable)?;
        Ok(removed)
    }

    async fn replace_all(&self, records: &[ArchiveRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        sqlx::query("DELETE FROM index_entries")
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        // Identifiers claimed by several archives keep the last record's entry.
        let mut written = std::collections::BTreeSet::new();
        for record in records {
            for entry in record.entries() {
                insert_record(&mut *tx, &entry).await?;
                written.insert(entry.identifier);
            }
        }

        tx.commit().await.map_err(unavailable)?;
        Ok(written.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn index(dir: &tempfile::TempDir) -> SqliteIndex {
        let pool = db::open(&dir.path().join("index.sqlite")).await.unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        SqliteIndex::new(pool)
    }

    fn record(digest: &str, ids: &[&str]) -> ArchiveRecord {
        ArchiveRecord {
            identifiers: ids.iter().map(|s| s.to_string()).collect(),
            digest: digest.to_string(),
            system: "stcv".to_string(),
            location: format!("/iiif/{digest}/db.sqlite"),
            meta_time: Some(Utc.with_ymd_and_hms(2022, 3, 13, 10, 0, 0).unwrap()),
            archive_time: None,
        }
    }

    #[tokio::test]
    async fn lookup_unknown_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir).await;
        assert_eq!(index.lookup("c:stcv:404").await.unwrap(), None);
        assert!(index.search("c:stcv:404").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_search_delete() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir).await;

        index.upsert(&record("d1", &["c:stcv:1", "o:lib:1"])).await.unwrap();
        index.upsert(&record("d2", &["c:stcv:2"])).await.unwrap();

        let hits = index.search("d1").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].identifier, "c:stcv:1");
        assert_eq!(hits[0].meta_time, record("d1", &[]).meta_time);
        assert_eq!(hits[0].archive_time, None);

        let by_id = index.search("c:stcv:2").await.unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].digest, "d2");

        // Exact match only.
        assert!(index.search("c:stcv").await.unwrap().is_empty());

        assert_eq!(index.delete("d1").await.unwrap(), 2);
        assert_eq!(index.lookup("o:lib:1").await.unwrap(), None);
        assert_eq!(index.lookup("c:stcv:2").await.unwrap().as_deref(), Some("d2"));
    }

    #[tokio::test]
    async fn identifier_moves_between_digests() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir).await;

        index.upsert(&record("d1", &["c:stcv:1"])).await.unwrap();
        index.upsert(&record("d2", &["c:stcv:1"])).await.unwrap();
        assert_eq!(index.lookup("c:stcv:1").await.unwrap().as_deref(), Some("d2"));
        assert!(index.search("d1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_digest_swaps_entries_in_one_step() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir).await;
        index.upsert(&record("d1", &["a", "b"])).await.unwrap();
        index.upsert(&record("d2", &["c"])).await.unwrap();

        let mut fresh = record("d1", &["b", "x"]);
        fresh.location = "/iiif/moved/db.sqlite".to_string();
        assert_eq!(index.replace_digest(&fresh).await.unwrap(), 2);

        let hits = index.search("d1").await.unwrap();
        assert_eq!(
            hits.iter().map(|e| e.identifier.as_str()).collect::<Vec<_>>(),
            vec!["b", "x"]
        );
        assert!(hits.iter().all(|e| e.location == "/iiif/moved/db.sqlite"));
        assert_eq!(index.lookup("c").await.unwrap().as_deref(), Some("d2"));
    }

    #[tokio::test]
    async fn failed_replace_digest_keeps_old_entries() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir).await;
        index.upsert(&record("d1", &["a"])).await.unwrap();

        // Make the insert half fail after the delete half has run.
        sqlx::query(
            "CREATE TRIGGER reject_x BEFORE INSERT ON index_entries \
             WHEN NEW.identifier = 'x' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&index.pool)
        .await
        .unwrap();

        let err = index.replace_digest(&record("d1", &["x"])).await.unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
        assert_eq!(index.lookup("a").await.unwrap().as_deref(), Some("d1"));
    }

    #[tokio::test]
    async fn replace_all_twice_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir).await;
        index.upsert(&record("stale", &["gone"])).await.unwrap();

        let records = vec![record("d1", &["a", "b"]), record("d2", &["c"])];
        assert_eq!(index.replace_all(&records).await.unwrap(), 3);
        let first = index.search("d1").await.unwrap();
        assert_eq!(index.replace_all(&records).await.unwrap(), 3);
        assert_eq!(index.search("d1").await.unwrap(), first);
        assert_eq!(index.lookup("gone").await.unwrap(), None);
    }

    #[tokio::test]
    async fn closed_pool_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir).await;
        index.close().await;
        let err = index.lookup("a").await.unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
    }
}
