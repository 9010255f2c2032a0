//! Database access for ladle-vi

pub mod jobs;
pub mod recipes;
pub mod settings;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to ladle.db in the root folder, creating it on first run.
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

/// Initialize ladle-vi specific tables
///
/// Creates settings, ingest_jobs, and recipes tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    // Settings table for parameter persistence
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per ingestion job, updated as the pipeline progresses
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingest_jobs (
            job_id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            owner_uid TEXT NOT NULL,
            recipe_id TEXT NOT NULL,
            status TEXT NOT NULL,
            title TEXT,
            transcript TEXT,
            ocr_text TEXT NOT NULL DEFAULT '[]',
            sufficiency TEXT,
            ocr_skipped INTEGER,
            fallback_triggered INTEGER NOT NULL DEFAULT 0,
            recipe_json TEXT,
            parse_errors TEXT NOT NULL DEFAULT '[]',
            llm_model_used TEXT,
            llm_processing_ms INTEGER,
            error_code TEXT,
            error_message TEXT,
            thumbnail_url TEXT,
            author_handle TEXT,
            stage_timings TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Owned recipe records: stub row at job start, finalized on success
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipes (
            recipe_id TEXT PRIMARY KEY,
            owner_uid TEXT NOT NULL,
            job_id TEXT NOT NULL,
            status TEXT NOT NULL,
            source_url TEXT NOT NULL,
            title TEXT,
            recipe_json TEXT,
            author_handle TEXT,
            thumbnail_url TEXT,
            likes_count INTEGER NOT NULL DEFAULT 0,
            saved_by TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (settings, ingest_jobs, recipes)");

    Ok(())
}
