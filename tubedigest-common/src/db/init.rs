//! Database initialization
//!
//! Opens (creating if needed) the SQLite database in the data folder and
//! creates every table idempotently. Safe to run on each startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys must be enabled per connection, so they go in the connect options
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// A single connection is kept alive for the pool lifetime; an in-memory
/// SQLite database disappears with its last connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_channels_table(pool).await?;
    create_videos_table(pool).await?;
    create_summaries_table(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs (API keys, vault settings).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the channels table
///
/// `external_id` is the canonical YouTube channel identifier produced by the
/// channel resolver; it is the uniqueness key for registrations.
pub async fn create_channels_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            guid TEXT PRIMARY KEY,
            external_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            source_url TEXT NOT NULL,
            custom_url TEXT,
            description TEXT NOT NULL DEFAULT '',
            thumbnail_url TEXT,
            uploads_playlist_id TEXT,
            frequency TEXT NOT NULL DEFAULT 'daily',
            active INTEGER NOT NULL DEFAULT 1,
            resolution_tier TEXT NOT NULL,
            last_checked_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the videos table
pub async fn create_videos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            guid TEXT PRIMARY KEY,
            channel_guid TEXT NOT NULL REFERENCES channels(guid) ON DELETE CASCADE,
            external_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            thumbnail_url TEXT,
            published_at TEXT NOT NULL,
            duration_seconds INTEGER,
            view_count INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos(channel_guid, published_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the summaries table
///
/// `video_guid` is nullable and set to NULL when the video row is deleted, so
/// summaries outlive their videos. `video_external_id` and `video_title` keep
/// enough of the video to render exports afterwards.
pub async fn create_summaries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summaries (
            guid TEXT PRIMARY KEY,
            video_guid TEXT REFERENCES videos(guid) ON DELETE SET NULL,
            channel_guid TEXT NOT NULL REFERENCES channels(guid) ON DELETE CASCADE,
            video_external_id TEXT NOT NULL,
            video_title TEXT NOT NULL,
            video_published_at TEXT,
            title TEXT NOT NULL,
            core_theme TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            sections TEXT NOT NULL DEFAULT '[]',
            key_points TEXT NOT NULL DEFAULT '[]',
            insights TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            model TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_summaries_channel ON summaries(channel_guid)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_summaries_video ON summaries(video_guid)")
        .execute(pool)
        .await?;

    Ok(())
}
