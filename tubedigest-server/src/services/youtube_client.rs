//! YouTube Data API v3 client
//!
//! Implements the two seams the rest of the service depends on:
//! [`ChannelDirectory`] (channel lookup and search, used by the channel
//! resolver) and [`VideoCatalog`] (channel details and recent uploads, used
//! by registration and the poller). Both are traits so tests can substitute
//! in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::SharedSecret;
use crate::models::NewVideo;
use crate::utils::duration::parse_iso8601_duration;

pub const YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const USER_AGENT: &str = concat!("TubeDigest/", env!("CARGO_PKG_VERSION"));
const RATE_LIMIT_MS: u64 = 100;

/// YouTube client errors
#[derive(Debug, Error)]
pub enum YouTubeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("YouTube API key not configured")]
    MissingApiKey,

    #[error("YouTube API quota exceeded")]
    QuotaExceeded,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Channel record as returned by lookup or search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCandidate {
    pub channel_id: String,
    pub title: String,
    /// Vanity URL such as `@handle`, when the channel has one
    pub custom_url: Option<String>,
    pub description: String,
}

/// Channel metadata needed for registration and polling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDetails {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub custom_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub uploads_playlist_id: Option<String>,
}

/// Channel lookup and search
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// `channels.list?forUsername=`; empty when no legacy username matches
    async fn lookup_by_username(&self, username: &str) -> Result<Vec<ChannelCandidate>, YouTubeError>;

    /// `search.list?type=channel`, in upstream ranking order
    async fn search_channels(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<ChannelCandidate>, YouTubeError>;
}

/// Channel details and upload listing
#[async_trait]
pub trait VideoCatalog: Send + Sync {
    async fn channel_details(&self, channel_id: &str) -> Result<ChannelDetails, YouTubeError>;

    /// Most recent uploads, newest first
    async fn recent_uploads(
        &self,
        uploads_playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<NewVideo>, YouTubeError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(&self) -> Option<String> {
        self.high
            .as_ref()
            .or(self.medium.as_ref())
            .or(self.default.as_ref())
            .map(|t| t.url.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    id: String,
    #[serde(default)]
    snippet: ChannelSnippet,
    #[serde(default)]
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChannelSnippet {
    title: String,
    description: String,
    custom_url: Option<String>,
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    #[serde(default)]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

impl ChannelItem {
    fn into_candidate(self) -> ChannelCandidate {
        ChannelCandidate {
            channel_id: self.id,
            title: self.snippet.title,
            custom_url: self.snippet.custom_url,
            description: self.snippet.description,
        }
    }

    fn into_details(self) -> ChannelDetails {
        ChannelDetails {
            thumbnail_url: self.snippet.thumbnails.best(),
            uploads_playlist_id: self
                .content_details
                .and_then(|d| d.related_playlists.uploads),
            channel_id: self.id,
            title: self.snippet.title,
            description: self.snippet.description,
            custom_url: self.snippet.custom_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    #[serde(default)]
    snippet: ChannelSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(default)]
    content_details: Option<VideoContentDetails>,
    #[serde(default)]
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    #[serde(default)]
    description: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    /// Counts arrive as decimal strings
    view_count: Option<String>,
}

impl VideoItem {
    fn into_new_video(self) -> NewVideo {
        NewVideo {
            duration_seconds: self
                .content_details
                .and_then(|d| d.duration)
                .and_then(|d| parse_iso8601_duration(&d)),
            view_count: self
                .statistics
                .and_then(|s| s.view_count)
                .and_then(|v| v.parse().ok()),
            thumbnail_url: self.snippet.thumbnails.best(),
            external_id: self.id,
            title: self.snippet.title,
            description: self.snippet.description,
            published_at: self.snippet.published_at,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Minimum spacing between outgoing requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// YouTube Data API client
pub struct YouTubeClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: SharedSecret,
    rate_limiter: Arc<RateLimiter>,
}

impl YouTubeClient {
    /// Client against the public API
    pub fn new(api_key: SharedSecret) -> Result<Self, YouTubeError> {
        Self::with_base_url(YOUTUBE_API_BASE_URL, api_key)
    }

    /// Client against an alternative base URL (proxies, local test servers)
    pub fn with_base_url(base_url: &str, api_key: SharedSecret) -> Result<Self, YouTubeError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| YouTubeError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, YouTubeError> {
        let key = self.api_key.get().await.ok_or(YouTubeError::MissingApiKey)?;

        self.rate_limiter.wait().await;

        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(endpoint = %endpoint, "Querying YouTube Data API");

        let response = self
            .http_client
            .get(&url)
            .query(params)
            .query(&[("key", key.as_str())])
            .send()
            .await
            .map_err(|e| YouTubeError::NetworkError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status == StatusCode::FORBIDDEN && error_text.contains("quotaExceeded") {
                return Err(YouTubeError::QuotaExceeded);
            }
            return Err(YouTubeError::ApiError(status.as_u16(), error_text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| YouTubeError::ParseError(e.to_string()))
    }

    /// Custom URLs for a batch of channel ids (search snippets omit them)
    async fn custom_urls(&self, ids: &[String]) -> Result<HashMap<String, String>, YouTubeError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let response: ListResponse<ChannelItem> = self
            .get_json(
                "channels",
                &[("part", "snippet".to_string()), ("id", ids.join(","))],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.snippet.custom_url.map(|url| (item.id, url)))
            .collect())
    }
}

#[async_trait]
impl ChannelDirectory for YouTubeClient {
    async fn lookup_by_username(&self, username: &str) -> Result<Vec<ChannelCandidate>, YouTubeError> {
        let response: ListResponse<ChannelItem> = self
            .get_json(
                "channels",
                &[
                    ("part", "snippet".to_string()),
                    ("forUsername", username.to_string()),
                ],
            )
            .await?;

        tracing::debug!(username = %username, results = response.items.len(), "Legacy username lookup");

        Ok(response.items.into_iter().map(ChannelItem::into_candidate).collect())
    }

    async fn search_channels(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<ChannelCandidate>, YouTubeError> {
        let response: ListResponse<SearchItem> = self
            .get_json(
                "search",
                &[
                    ("part", "snippet".to_string()),
                    ("type", "channel".to_string()),
                    ("q", query.to_string()),
                    ("maxResults", max_results.to_string()),
                ],
            )
            .await?;

        let mut candidates: Vec<ChannelCandidate> = response
            .items
            .into_iter()
            .filter_map(|item| {
                item.id.channel_id.map(|channel_id| ChannelCandidate {
                    channel_id,
                    title: item.snippet.title,
                    custom_url: item.snippet.custom_url,
                    description: item.snippet.description,
                })
            })
            .collect();

        let missing: Vec<String> = candidates
            .iter()
            .filter(|c| c.custom_url.is_none())
            .map(|c| c.channel_id.clone())
            .collect();

        // Enrichment is best-effort; the search hits stand on their own
        if !missing.is_empty() {
            let urls = self.custom_urls(&missing).await.unwrap_or_else(|e| {
                tracing::warn!(query = %query, error = %e, "Custom URL lookup failed, ranking without it");
                HashMap::new()
            });
            for candidate in candidates.iter_mut() {
                if candidate.custom_url.is_none() {
                    candidate.custom_url = urls.get(&candidate.channel_id).cloned();
                }
            }
        }

        tracing::debug!(query = %query, results = candidates.len(), "Channel search");

        Ok(candidates)
    }
}

#[async_trait]
impl VideoCatalog for YouTubeClient {
    async fn channel_details(&self, channel_id: &str) -> Result<ChannelDetails, YouTubeError> {
        let response: ListResponse<ChannelItem> = self
            .get_json(
                "channels",
                &[
                    ("part", "snippet,contentDetails".to_string()),
                    ("id", channel_id.to_string()),
                ],
            )
            .await?;

        response
            .items
            .into_iter()
            .next()
            .map(ChannelItem::into_details)
            .ok_or_else(|| YouTubeError::NotFound(format!("channel {}", channel_id)))
    }

    async fn recent_uploads(
        &self,
        uploads_playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<NewVideo>, YouTubeError> {
        let playlist: ListResponse<PlaylistItem> = self
            .get_json(
                "playlistItems",
                &[
                    ("part", "contentDetails".to_string()),
                    ("playlistId", uploads_playlist_id.to_string()),
                    ("maxResults", max_results.to_string()),
                ],
            )
            .await?;

        let ids: Vec<String> = playlist
            .items
            .into_iter()
            .map(|item| item.content_details.video_id)
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let videos: ListResponse<VideoItem> = self
            .get_json(
                "videos",
                &[
                    ("part", "snippet,contentDetails,statistics".to_string()),
                    ("id", ids.join(",")),
                ],
            )
            .await?;

        let mut uploads: Vec<NewVideo> = videos
            .items
            .into_iter()
            .map(VideoItem::into_new_video)
            .collect();
        uploads.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        tracing::debug!(
            playlist = %uploads_playlist_id,
            videos = uploads.len(),
            "Fetched recent uploads"
        );

        Ok(uploads)
    }
}
