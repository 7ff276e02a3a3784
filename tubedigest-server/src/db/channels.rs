//! Channel persistence

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tubedigest_common::{Error, Result};
use uuid::Uuid;

use super::{parse_guid, parse_optional_timestamp, parse_timestamp};
use crate::models::{Channel, PollFrequency};
use crate::services::channel_resolver::ResolutionTier;

const CHANNEL_COLUMNS: &str = "guid, external_id, name, source_url, custom_url, description, \
     thumbnail_url, uploads_playlist_id, frequency, active, resolution_tier, last_checked_at, \
     created_at, updated_at";

fn channel_from_row(row: &SqliteRow) -> Result<Channel> {
    let guid: String = row.get("guid");
    let frequency: String = row.get("frequency");
    let tier: String = row.get("resolution_tier");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Channel {
        guid: parse_guid(&guid)?,
        external_id: row.get("external_id"),
        name: row.get("name"),
        source_url: row.get("source_url"),
        custom_url: row.get("custom_url"),
        description: row.get("description"),
        thumbnail_url: row.get("thumbnail_url"),
        uploads_playlist_id: row.get("uploads_playlist_id"),
        frequency: frequency.parse::<PollFrequency>().map_err(Error::Internal)?,
        active: row.get::<i64, _>("active") != 0,
        resolution_tier: tier.parse::<ResolutionTier>().map_err(Error::Internal)?,
        last_checked_at: parse_optional_timestamp(row.get("last_checked_at"))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Insert a newly resolved channel
///
/// A second registration of the same external id fails with `Duplicate`.
pub async fn insert_channel(pool: &SqlitePool, channel: &Channel) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO channels (
            guid, external_id, name, source_url, custom_url, description, thumbnail_url,
            uploads_playlist_id, frequency, active, resolution_tier, last_checked_at,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(channel.guid.to_string())
    .bind(&channel.external_id)
    .bind(&channel.name)
    .bind(&channel.source_url)
    .bind(&channel.custom_url)
    .bind(&channel.description)
    .bind(&channel.thumbnail_url)
    .bind(&channel.uploads_playlist_id)
    .bind(channel.frequency.as_str())
    .bind(channel.active as i64)
    .bind(channel.resolution_tier.as_str())
    .bind(channel.last_checked_at.map(|t| t.to_rfc3339()))
    .bind(channel.created_at.to_rfc3339())
    .bind(channel.updated_at.to_rfc3339())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            let err = Error::from(e);
            if err.is_unique_violation() {
                Err(Error::Duplicate(format!(
                    "Channel {} is already registered",
                    channel.external_id
                )))
            } else {
                Err(err)
            }
        }
    }
}

pub async fn get_channel(pool: &SqlitePool, guid: Uuid) -> Result<Option<Channel>> {
    let row = sqlx::query(&format!("SELECT {} FROM channels WHERE guid = ?", CHANNEL_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(channel_from_row).transpose()
}

pub async fn get_channel_by_external_id(pool: &SqlitePool, external_id: &str) -> Result<Option<Channel>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM channels WHERE external_id = ?",
        CHANNEL_COLUMNS
    ))
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(channel_from_row).transpose()
}

/// All channels, alphabetical
pub async fn list_channels(pool: &SqlitePool) -> Result<Vec<Channel>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM channels ORDER BY name COLLATE NOCASE",
        CHANNEL_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(channel_from_row).collect()
}

/// Change polling frequency and/or active flag
///
/// Returns the updated channel, `None` if it does not exist.
pub async fn update_channel(
    pool: &SqlitePool,
    guid: Uuid,
    frequency: Option<PollFrequency>,
    active: Option<bool>,
) -> Result<Option<Channel>> {
    let result = sqlx::query(
        r#"
        UPDATE channels
        SET frequency = COALESCE(?, frequency),
            active = COALESCE(?, active),
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(frequency.map(|f| f.as_str()))
    .bind(active.map(|a| a as i64))
    .bind(Utc::now().to_rfc3339())
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_channel(pool, guid).await
}

pub async fn set_uploads_playlist(pool: &SqlitePool, guid: Uuid, playlist_id: &str) -> Result<()> {
    sqlx::query("UPDATE channels SET uploads_playlist_id = ?, updated_at = ? WHERE guid = ?")
        .bind(playlist_id)
        .bind(Utc::now().to_rfc3339())
        .bind(guid.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_checked(pool: &SqlitePool, guid: Uuid, checked_at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE channels SET last_checked_at = ? WHERE guid = ?")
        .bind(checked_at.to_rfc3339())
        .bind(guid.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a channel; its videos and summaries go with it
pub async fn delete_channel(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM channels WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
