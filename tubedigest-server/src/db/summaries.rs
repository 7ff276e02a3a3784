//! Summary persistence
//!
//! Structured parts (sections, key points, insights, tags) are stored as
//! JSON text columns.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tubedigest_common::{Error, Result};
use uuid::Uuid;

use super::{parse_guid, parse_optional_timestamp, parse_timestamp};
use crate::models::Summary;
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

const SUMMARY_COLUMNS: &str = "guid, video_guid, channel_guid, video_external_id, video_title, \
     video_published_at, title, core_theme, content, sections, key_points, insights, tags, \
     model, created_at";

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Internal(format!("Serialize summary failed: {}", e)))
}

fn from_json<T: DeserializeOwned>(column: &str, value: &str) -> Result<T> {
    serde_json::from_str(value)
        .map_err(|e| Error::Internal(format!("Invalid JSON in summaries.{}: {}", column, e)))
}

fn summary_from_row(row: &SqliteRow) -> Result<Summary> {
    let guid: String = row.get("guid");
    let video_guid: Option<String> = row.get("video_guid");
    let channel_guid: String = row.get("channel_guid");
    let created_at: String = row.get("created_at");
    let sections: String = row.get("sections");
    let key_points: String = row.get("key_points");
    let insights: String = row.get("insights");
    let tags: String = row.get("tags");

    Ok(Summary {
        guid: parse_guid(&guid)?,
        video_guid: video_guid.as_deref().map(parse_guid).transpose()?,
        channel_guid: parse_guid(&channel_guid)?,
        video_external_id: row.get("video_external_id"),
        video_title: row.get("video_title"),
        video_published_at: parse_optional_timestamp(row.get("video_published_at"))?,
        title: row.get("title"),
        core_theme: row.get("core_theme"),
        content: row.get("content"),
        sections: from_json("sections", &sections)?,
        key_points: from_json("key_points", &key_points)?,
        insights: from_json("insights", &insights)?,
        tags: from_json("tags", &tags)?,
        model: row.get("model"),
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Store a summary, retrying while the database is locked
pub async fn insert_summary(pool: &SqlitePool, summary: &Summary) -> Result<()> {
    let sections = to_json(&summary.sections)?;
    let key_points = to_json(&summary.key_points)?;
    let insights = to_json(&summary.insights)?;
    let tags = to_json(&summary.tags)?;
    let (sections, key_points, insights, tags) = (&sections, &key_points, &insights, &tags);

    retry_on_lock("summary insert", DEFAULT_MAX_LOCK_WAIT_MS, move || async move {
        sqlx::query(
            r#"
            INSERT INTO summaries (
                guid, video_guid, channel_guid, video_external_id, video_title,
                video_published_at, title, core_theme, content, sections, key_points,
                insights, tags, model, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(summary.guid.to_string())
        .bind(summary.video_guid.map(|g| g.to_string()))
        .bind(summary.channel_guid.to_string())
        .bind(&summary.video_external_id)
        .bind(&summary.video_title)
        .bind(summary.video_published_at.map(|t| t.to_rfc3339()))
        .bind(&summary.title)
        .bind(&summary.core_theme)
        .bind(&summary.content)
        .bind(sections)
        .bind(key_points)
        .bind(insights)
        .bind(tags)
        .bind(&summary.model)
        .bind(summary.created_at.to_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

pub async fn get_summary(pool: &SqlitePool, guid: Uuid) -> Result<Option<Summary>> {
    let row = sqlx::query(&format!("SELECT {} FROM summaries WHERE guid = ?", SUMMARY_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(summary_from_row).transpose()
}

/// Summaries, newest video first, optionally limited to one channel
pub async fn list_summaries(pool: &SqlitePool, channel_guid: Option<Uuid>) -> Result<Vec<Summary>> {
    let rows = match channel_guid {
        Some(channel_guid) => {
            sqlx::query(&format!(
                "SELECT {} FROM summaries WHERE channel_guid = ? \
                 ORDER BY video_published_at DESC, created_at DESC",
                SUMMARY_COLUMNS
            ))
            .bind(channel_guid.to_string())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM summaries ORDER BY video_published_at DESC, created_at DESC",
                SUMMARY_COLUMNS
            ))
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(summary_from_row).collect()
}

pub async fn delete_summary(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM summaries WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::channels::insert_channel;
    use crate::db::test_support::{sample_channel, sample_new_video};
    use crate::db::videos::{delete_video, insert_if_new, list_by_channel, list_unsummarized};
    use crate::models::{SummaryDraft, SummarySection};
    use tubedigest_common::db::init_memory_database;

    fn draft() -> SummaryDraft {
        SummaryDraft {
            title: "Summary".to_string(),
            core_theme: "theme".to_string(),
            content: "body".to_string(),
            sections: vec![SummarySection {
                title: "Intro".to_string(),
                timestamp: Some("00:30".to_string()),
                content: "first".to_string(),
                key_words: vec!["rust".to_string()],
            }],
            key_points: vec!["point".to_string()],
            insights: vec!["insight".to_string()],
            tags: vec!["tag".to_string()],
        }
    }

    #[tokio::test]
    async fn test_insert_and_load_structured_fields() {
        let pool = init_memory_database().await.unwrap();
        let channel = sample_channel("UCs");
        insert_channel(&pool, &channel).await.unwrap();
        let video = insert_if_new(&pool, channel.guid, &sample_new_video("vs", 3))
            .await
            .unwrap()
            .unwrap();

        let summary = Summary::from_draft(draft(), &video, "test-model");
        insert_summary(&pool, &summary).await.unwrap();

        let loaded = get_summary(&pool, summary.guid).await.unwrap().unwrap();
        assert_eq!(loaded.sections, summary.sections);
        assert_eq!(loaded.tags, vec!["tag".to_string()]);
        assert_eq!(loaded.model, "test-model");
        assert_eq!(loaded.video_guid, Some(video.guid));

        let listing = list_by_channel(&pool, channel.guid).await.unwrap();
        assert_eq!(listing[0].summary_guid, Some(summary.guid));
        assert!(list_unsummarized(&pool, channel.guid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_survives_video_deletion() {
        let pool = init_memory_database().await.unwrap();
        let channel = sample_channel("UCkeep");
        insert_channel(&pool, &channel).await.unwrap();
        let video = insert_if_new(&pool, channel.guid, &sample_new_video("vk", 4))
            .await
            .unwrap()
            .unwrap();
        let summary = Summary::from_draft(draft(), &video, "m");
        insert_summary(&pool, &summary).await.unwrap();

        assert!(delete_video(&pool, video.guid).await.unwrap());

        let loaded = get_summary(&pool, summary.guid).await.unwrap().unwrap();
        assert_eq!(loaded.video_guid, None);
        assert_eq!(loaded.channel_guid, channel.guid);
        assert_eq!(loaded.video_external_id, "vk");
    }

    #[tokio::test]
    async fn test_list_filters_by_channel() {
        let pool = init_memory_database().await.unwrap();
        let a = sample_channel("UCa");
        let b = sample_channel("UCb");
        insert_channel(&pool, &a).await.unwrap();
        insert_channel(&pool, &b).await.unwrap();

        for (channel, id) in [(&a, "va"), (&b, "vb")] {
            let video = insert_if_new(&pool, channel.guid, &sample_new_video(id, 5))
                .await
                .unwrap()
                .unwrap();
            insert_summary(&pool, &Summary::from_draft(draft(), &video, "m"))
                .await
                .unwrap();
        }

        assert_eq!(list_summaries(&pool, None).await.unwrap().len(), 2);
        let only_a = list_summaries(&pool, Some(a.guid)).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].video_external_id, "va");

        assert!(delete_summary(&pool, only_a[0].guid).await.unwrap());
        assert_eq!(list_summaries(&pool, Some(a.guid)).await.unwrap().len(), 0);
    }
}
