//! Database access for CineVibe
//!
//! All CineVibe tooling shares one SQLite database in the data folder.
//! Catalog rows are created by the ingestion tooling; the enrichment core
//! mutates them in place and owns the failure/checkpoint bookkeeping tables.

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to `catalog.db` in the data folder, creating the file and any
/// missing tables on first use.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create CineVibe tables if they don't exist
///
/// `catalog_items` carries both the raw source fields (written by ingestion)
/// and the enrichment result columns (written only by the atomic commit).
/// The three embedding columns hold JSON-serialized `Vec<f32>` and are always
/// written in the same statement as the metadata columns.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_items (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            overview TEXT NOT NULL DEFAULT '',
            release_year INTEGER,
            genres TEXT NOT NULL DEFAULT '[]',
            keywords TEXT NOT NULL DEFAULT '[]',
            cast_names TEXT NOT NULL DEFAULT '[]',
            popularity REAL NOT NULL DEFAULT 0.0,
            setting_place TEXT,
            setting_time TEXT,
            protagonist TEXT,
            goal TEXT,
            obstacle TEXT,
            stakes TEXT,
            themes TEXT,
            vibes TEXT,
            tone TEXT,
            pacing TEXT,
            profile_text TEXT,
            source_url TEXT,
            enrich_method TEXT,
            vibe_embedding TEXT,
            content_embedding TEXT,
            metadata_embedding TEXT,
            enriched_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrichment_failures (
            id TEXT PRIMARY KEY,
            item_id INTEGER NOT NULL,
            phase TEXT NOT NULL,
            error_kind TEXT NOT NULL,
            message TEXT NOT NULL DEFAULT '',
            retry_count INTEGER NOT NULL DEFAULT 0,
            resolved INTEGER NOT NULL DEFAULT 0,
            last_attempt_at TEXT NOT NULL,
            UNIQUE (item_id, phase)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrichment_checkpoints (
            phase TEXT PRIMARY KEY,
            total INTEGER NOT NULL DEFAULT 0,
            succeeded INTEGER NOT NULL DEFAULT 0,
            failed INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            processed_ids TEXT NOT NULL DEFAULT '[]',
            last_item_id INTEGER,
            started_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (catalog_items, enrichment_failures, enrichment_checkpoints)"
    );

    Ok(())
}
