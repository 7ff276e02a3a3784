//! Database access for tubedigest-server
//!
//! Rows store guids and timestamps as TEXT (hyphenated UUIDs, RFC 3339).

pub mod channels;
pub mod settings;
pub mod summaries;
pub mod videos;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::Path;
use tubedigest_common::{Error, Result};
use uuid::Uuid;

/// Open the service database and make sure the schema exists
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", db_path.display());
    let pool = tubedigest_common::db::init_database(db_path).await?;
    tracing::info!("Database tables initialized (settings, channels, videos, summaries)");
    Ok(pool)
}

pub(crate) fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid guid '{}': {}", value, e)))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}
