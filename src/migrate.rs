use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the index schema on an open pool. Idempotent.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_entries (
            identifier TEXT PRIMARY KEY,
            digest TEXT NOT NULL,
            system TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL,
            meta_time TEXT,
            archive_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_index_entries_digest ON index_entries(digest)")
        .execute(pool)
        .await?;

    Ok(())
}
