//! Video persistence

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tubedigest_common::Result;
use uuid::Uuid;

use super::{parse_guid, parse_timestamp};
use crate::models::{NewVideo, Video, VideoListing};

const VIDEO_COLUMNS: &str = "v.guid, v.channel_guid, v.external_id, v.title, v.description, \
     v.thumbnail_url, v.published_at, v.duration_seconds, v.view_count, v.created_at";

fn video_from_row(row: &SqliteRow) -> Result<Video> {
    let guid: String = row.get("guid");
    let channel_guid: String = row.get("channel_guid");
    let published_at: String = row.get("published_at");
    let created_at: String = row.get("created_at");

    Ok(Video {
        guid: parse_guid(&guid)?,
        channel_guid: parse_guid(&channel_guid)?,
        external_id: row.get("external_id"),
        title: row.get("title"),
        description: row.get("description"),
        thumbnail_url: row.get("thumbnail_url"),
        published_at: parse_timestamp(&published_at)?,
        duration_seconds: row.get("duration_seconds"),
        view_count: row.get("view_count"),
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Insert a fetched video unless its external id is already stored
///
/// Returns the stored video when it was new.
pub async fn insert_if_new(pool: &SqlitePool, channel_guid: Uuid, video: &NewVideo) -> Result<Option<Video>> {
    let stored = Video {
        guid: Uuid::new_v4(),
        channel_guid,
        external_id: video.external_id.clone(),
        title: video.title.clone(),
        description: video.description.clone(),
        thumbnail_url: video.thumbnail_url.clone(),
        published_at: video.published_at,
        duration_seconds: video.duration_seconds,
        view_count: video.view_count,
        created_at: Utc::now(),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO videos (
            guid, channel_guid, external_id, title, description, thumbnail_url,
            published_at, duration_seconds, view_count, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(external_id) DO NOTHING
        "#,
    )
    .bind(stored.guid.to_string())
    .bind(channel_guid.to_string())
    .bind(&stored.external_id)
    .bind(&stored.title)
    .bind(&stored.description)
    .bind(&stored.thumbnail_url)
    .bind(stored.published_at.to_rfc3339())
    .bind(stored.duration_seconds)
    .bind(stored.view_count)
    .bind(stored.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok((result.rows_affected() == 1).then_some(stored))
}

pub async fn get_video(pool: &SqlitePool, guid: Uuid) -> Result<Option<Video>> {
    let row = sqlx::query(&format!("SELECT {} FROM videos v WHERE v.guid = ?", VIDEO_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(video_from_row).transpose()
}

/// Videos of a channel, newest first, with their latest summary id
pub async fn list_by_channel(pool: &SqlitePool, channel_guid: Uuid) -> Result<Vec<VideoListing>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {},
            (SELECT s.guid FROM summaries s WHERE s.video_guid = v.guid
             ORDER BY s.created_at DESC LIMIT 1) AS summary_guid
        FROM videos v
        WHERE v.channel_guid = ?
        ORDER BY v.published_at DESC
        "#,
        VIDEO_COLUMNS
    ))
    .bind(channel_guid.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let summary_guid: Option<String> = row.get("summary_guid");
            Ok(VideoListing {
                video: video_from_row(row)?,
                summary_guid: summary_guid.as_deref().map(parse_guid).transpose()?,
            })
        })
        .collect()
}

/// Videos of a channel that have no summary yet, oldest first
pub async fn list_unsummarized(pool: &SqlitePool, channel_guid: Uuid) -> Result<Vec<Video>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM videos v
        WHERE v.channel_guid = ?
          AND NOT EXISTS (SELECT 1 FROM summaries s WHERE s.video_guid = v.guid)
        ORDER BY v.published_at ASC
        "#,
        VIDEO_COLUMNS
    ))
    .bind(channel_guid.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(video_from_row).collect()
}

/// Delete a video; its summaries stay, detached
pub async fn delete_video(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM videos WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
