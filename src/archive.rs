//! The archive container.
//!
//! An archive is one SQLite file holding the stored files (`sqlar`, the
//! SQLite archive format), an audit trail (`admin`), the docman identifier
//! each file came from (`files`), and a single `meta` row:
//!
//! | Table | Columns |
//! |-------|---------|
//! | `sqlar` | `name`, `mode`, `mtime` (unix seconds), `sz`, `data` |
//! | `admin` | `key`, `time` (RFC 3339), `action`, `user` |
//! | `files` | `key`, `docman`, `name` |
//! | `meta` | `key`, `digest`, `files_hash`, `indexes`, `system`, `manifest` |
//!
//! Archives live at `{archive root}/{archive_relative_path(digest)}`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use docvault_core::error::{Error, Result};
use docvault_core::models::{unique_identifiers, ArchiveRecord};
use docvault_core::shard::archive_relative_path;

/// Permission bits recorded for stored files.
const FILE_MODE: i64 = 0o100644;

const ACTION_CREATED: &str = "created";
const ACTION_UPDATE_META: &str = "update meta";

const SCHEMA: [&str; 4] = [
    "CREATE TABLE sqlar (name TEXT PRIMARY KEY, mode INT, mtime INT, sz INT, data BLOB)",
    "CREATE TABLE admin (key INTEGER PRIMARY KEY AUTOINCREMENT, time TEXT, action TEXT, user TEXT)",
    "CREATE TABLE files (key INTEGER PRIMARY KEY AUTOINCREMENT, docman TEXT, name TEXT)",
    "CREATE TABLE meta (key INTEGER PRIMARY KEY AUTOINCREMENT, digest TEXT, files_hash TEXT, \
     indexes TEXT, system TEXT, manifest TEXT)",
];

/// One file to store in an archive.
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    /// Name inside the archive.
    pub name: String,
    /// Identifier of the document the bytes were read from.
    pub docman: String,
    pub data: Vec<u8>,
}

/// The `meta` row of an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaRecord {
    pub digest: String,
    pub files_hash: String,
    /// `^`-joined index identifiers.
    pub indexes: String,
    pub system: String,
    pub manifest: String,
}

/// The `meta` row plus the archive's timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveMeta {
    #[serde(flatten)]
    pub record: MetaRecord,
    pub meta_time: Option<DateTime<Utc>>,
    pub archive_time: Option<DateTime<Utc>>,
}

impl ArchiveMeta {
    /// The index record for this archive stored at `location`.
    pub fn index_record(&self, location: &Path) -> ArchiveRecord {
        ArchiveRecord {
            identifiers: unique_identifiers(&self.record.indexes),
            digest: self.record.digest.clone(),
            system: self.record.system.clone(),
            location: location.display().to_string(),
            meta_time: self.meta_time,
            archive_time: self.archive_time,
        }
    }
}

/// Absolute path of the archive for `digest`.
pub fn archive_path(archive_root: &Path, digest: &str) -> Result<PathBuf> {
    Ok(archive_root.join(archive_relative_path(digest)?))
}

fn archive_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Archive {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

async fn open(path: &Path, create: bool) -> Result<SqlitePool> {
    if !create && !path.is_file() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(|e| archive_error(path, e))?
        .create_if_missing(create)
        .read_only(!create);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| archive_error(path, e))
}

fn user() -> String {
    std::env::var("USER").unwrap_or_default()
}

/// Write a new archive at `path`, replacing any existing one.
pub async fn write_archive(path: &Path, files: &[ArchiveFile], meta: &MetaRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io(path, e)),
    }

    let pool = open(path, true).await?;
    let result = fill(&pool, files, meta).await.map_err(|e| archive_error(path, e));
    pool.close().await;
    result
}

async fn fill(
    pool: &SqlitePool,
    files: &[ArchiveFile],
    meta: &MetaRecord,
) -> std::result::Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    let now = Utc::now();
    for file in files {
        sqlx::query("INSERT INTO sqlar (name, mode, mtime, sz, data) VALUES (?, ?, ?, ?, ?)")
            .bind(&file.name)
            .bind(FILE_MODE)
            .bind(now.timestamp())
            .bind(file.data.len() as i64)
            .bind(&file.data)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO files (docman, name) VALUES (?, ?)")
            .bind(&file.docman)
            .bind(&file.name)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        "INSERT INTO meta (digest, files_hash, indexes, system, manifest) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&meta.digest)
    .bind(&meta.files_hash)
    .bind(&meta.indexes)
    .bind(&meta.system)
    .bind(&meta.manifest)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO admin (time, action, user) VALUES (?, ?, ?)")
        .bind(now.to_rfc3339())
        .bind(ACTION_CREATED)
        .bind(user())
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

/// Read the `meta` row and timestamps of an archive.
///
/// A missing file is [`Error::NotFound`]. A file without a usable `meta`
/// row is [`Error::Archive`].
pub async fn read_archive_meta(path: &Path) -> Result<ArchiveMeta> {
    let pool = open(path, false).await?;
    let result = query_meta(&pool, path).await;
    pool.close().await;
    result
}

async fn query_meta(pool: &SqlitePool, path: &Path) -> Result<ArchiveMeta> {
    let row = sqlx::query(
        "SELECT digest, files_hash, indexes, system, manifest FROM meta ORDER BY key LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| archive_error(path, e))?
    .ok_or_else(|| archive_error(path, "no meta row"))?;

    let text = |column: &str| -> Result<String> {
        row.try_get::<Option<String>, _>(column)
            .map(Option::unwrap_or_default)
            .map_err(|e| archive_error(path, e))
    };
    let record = MetaRecord {
        digest: text("digest")?,
        files_hash: text("files_hash")?,
        indexes: text("indexes")?,
        system: text("system")?,
        manifest: text("manifest")?,
    };

    let meta_time = sqlx::query_scalar::<_, Option<String>>(
        r#"
        SELECT time FROM admin
        WHERE action IN (?, ?)
        ORDER BY action = ? DESC, key DESC
        LIMIT 1
        "#,
    )
    .bind(ACTION_UPDATE_META)
    .bind(ACTION_CREATED)
    .bind(ACTION_UPDATE_META)
    .fetch_optional(pool)
    .await
    .map_err(|e| archive_error(path, e))?
    .flatten();

    let archive_time: Option<i64> = sqlx::query_scalar("SELECT MAX(mtime) FROM sqlar")
        .fetch_one(pool)
        .await
        .map_err(|e| archive_error(path, e))?;

    Ok(ArchiveMeta {
        record,
        meta_time: meta_time
            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        archive_time: archive_time.and_then(|secs| DateTime::from_timestamp(secs, 0)),
    })
}

/// Bytes of one stored file.
pub async fn read_archive_file(path: &Path, name: &str) -> Result<Vec<u8>> {
    let pool = open(path, false).await?;
    let data: Option<Vec<u8>> = sqlx::query_scalar("SELECT data FROM sqlar WHERE name = ?")
        .bind(name)
        .fetch_optional(&pool)
        .await
        .map_err(|e| archive_error(path, e))?;
    pool.close().await;
    data.ok_or_else(|| Error::NotFound(format!("{name} in {}", path.display())))
}

/// One stored file as listed by [`list_archive_files`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub name: String,
    /// Identifier the bytes were read from, when recorded.
    pub docman: Option<String>,
    pub size: i64,
}

/// The stored files, in name order.
pub async fn list_archive_files(path: &Path) -> Result<Vec<StoredFile>> {
    let pool = open(path, false).await?;
    let rows = sqlx::query(
        r#"
        SELECT s.name, s.sz, f.docman
        FROM sqlar s LEFT JOIN files f ON f.name = s.name
        ORDER BY s.name
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| archive_error(path, e));
    pool.close().await;

    rows?
        .iter()
        .map(|row| {
            Ok(StoredFile {
                name: row.try_get("name").map_err(|e| archive_error(path, e))?,
                docman: row.try_get("docman").map_err(|e| archive_error(path, e))?,
                size: row
                    .try_get::<Option<i64>, _>("sz")
                    .map_err(|e| archive_error(path, e))?
                    .unwrap_or_default(),
            })
        })
        .collect()
}

/// Replace the manifest of an existing archive and log an `update meta`
/// action. The digest is left as it is.
pub async fn update_manifest(path: &Path, manifest: &str) -> Result<()> {
    if !path.is_file() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    let pool = open(path, true).await?;
    let result = async {
        let mut tx = pool.begin().await?;
        sqlx::query("UPDATE meta SET manifest = ?")
            .bind(manifest)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO admin (time, action, user) VALUES (?, ?, ?)")
            .bind(Utc::now().to_rfc3339())
            .bind(ACTION_UPDATE_META)
            .bind(user())
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }
    .await
    .map_err(|e| archive_error(path, e));
    pool.close().await;
    result
}
