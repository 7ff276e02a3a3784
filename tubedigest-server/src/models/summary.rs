//! Video summaries
//!
//! `SummaryDraft` is the shape the LLM is asked to produce; `Summary` is the
//! stored row. A summary keeps a copy of the video's identity so it can be
//! exported after the video row is gone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::video::Video;

/// One titled section of a summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarySection {
    pub title: String,
    /// Offset into the video, `mm:ss` or `h:mm:ss`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub content: String,
    pub key_words: Vec<String>,
}

/// Structured summary returned by the summarizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryDraft {
    pub title: String,
    pub core_theme: String,
    pub content: String,
    pub sections: Vec<SummarySection>,
    pub key_points: Vec<String>,
    pub insights: Vec<String>,
    pub tags: Vec<String>,
}

impl SummaryDraft {
    /// Fallback draft carrying unparsed model output
    pub fn minimal(title: &str, content: &str) -> Self {
        Self {
            title: title.to_string(),
            content: content.trim().to_string(),
            ..Default::default()
        }
    }

    /// A draft with neither body text nor sections carries nothing to keep
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.sections.is_empty()
    }
}

/// Summary row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub guid: Uuid,
    /// NULL once the video is deleted
    pub video_guid: Option<Uuid>,
    pub channel_guid: Uuid,
    pub video_external_id: String,
    pub video_title: String,
    pub video_published_at: Option<DateTime<Utc>>,
    pub title: String,
    pub core_theme: String,
    pub content: String,
    pub sections: Vec<SummarySection>,
    pub key_points: Vec<String>,
    pub insights: Vec<String>,
    pub tags: Vec<String>,
    /// Model that produced the summary
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn from_draft(draft: SummaryDraft, video: &Video, model: &str) -> Self {
        let title = if draft.title.trim().is_empty() {
            video.title.clone()
        } else {
            draft.title
        };

        Self {
            guid: Uuid::new_v4(),
            video_guid: Some(video.guid),
            channel_guid: video.channel_guid,
            video_external_id: video.external_id.clone(),
            video_title: video.title.clone(),
            video_published_at: Some(video.published_at),
            title,
            core_theme: draft.core_theme,
            content: draft.content,
            sections: draft.sections,
            key_points: draft.key_points,
            insights: draft.insights,
            tags: draft.tags,
            model: model.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn video_url(&self) -> String {
        super::video::watch_url(&self.video_external_id)
    }
}
