//! Registered YouTube channel

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::services::channel_resolver::ResolutionTier;
use crate::services::youtube_client::ChannelDetails;

/// How often the poller checks a channel for new uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollFrequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
    /// Only refreshed on explicit request
    Manual,
}

impl PollFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollFrequency::Hourly => "hourly",
            PollFrequency::Daily => "daily",
            PollFrequency::Weekly => "weekly",
            PollFrequency::Manual => "manual",
        }
    }

    /// Minimum time between automatic polls, `None` for manual channels
    pub fn interval(&self) -> Option<Duration> {
        match self {
            PollFrequency::Hourly => Some(Duration::hours(1)),
            PollFrequency::Daily => Some(Duration::days(1)),
            PollFrequency::Weekly => Some(Duration::weeks(1)),
            PollFrequency::Manual => None,
        }
    }
}

impl fmt::Display for PollFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PollFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(PollFrequency::Hourly),
            "daily" => Ok(PollFrequency::Daily),
            "weekly" => Ok(PollFrequency::Weekly),
            "manual" => Ok(PollFrequency::Manual),
            other => Err(format!("Unknown polling frequency: {}", other)),
        }
    }
}

/// Channel row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub guid: Uuid,
    /// Canonical YouTube channel id (`UC...`)
    pub external_id: String,
    pub name: String,
    /// URL the user registered the channel with
    pub source_url: String,
    pub custom_url: Option<String>,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub uploads_playlist_id: Option<String>,
    pub frequency: PollFrequency,
    pub active: bool,
    /// Resolver tier that produced `external_id`
    pub resolution_tier: ResolutionTier,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// New, never-polled channel from upstream details
    pub fn from_details(
        details: ChannelDetails,
        source_url: &str,
        frequency: PollFrequency,
        resolution_tier: ResolutionTier,
    ) -> Self {
        let now = Utc::now();
        Self {
            guid: Uuid::new_v4(),
            external_id: details.channel_id,
            name: details.title,
            source_url: source_url.trim().to_string(),
            custom_url: details.custom_url,
            description: details.description,
            thumbnail_url: details.thumbnail_url,
            uploads_playlist_id: details.uploads_playlist_id,
            frequency,
            active: true,
            resolution_tier,
            last_checked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the channel should be polled at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        match (self.frequency.interval(), self.last_checked_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(interval), Some(last)) => now - last >= interval,
        }
    }

    pub fn youtube_url(&self) -> String {
        format!("https://www.youtube.com/channel/{}", self.external_id)
    }
}
