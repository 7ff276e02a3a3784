//! Uploaded video metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Video row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub guid: Uuid,
    pub channel_guid: Uuid,
    /// YouTube video id
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub duration_seconds: Option<i64>,
    pub view_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Video {
    pub fn watch_url(&self) -> String {
        watch_url(&self.external_id)
    }
}

/// Video fetched from the catalog, not yet stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewVideo {
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub duration_seconds: Option<i64>,
    pub view_count: Option<i64>,
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Video plus its most recent summary, if any
#[derive(Debug, Clone, Serialize)]
pub struct VideoListing {
    #[serde(flatten)]
    pub video: Video,
    pub summary_guid: Option<Uuid>,
}
