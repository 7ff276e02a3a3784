//! Test helpers: in-process fakes for every external service and an app
//! builder on an in-memory database.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tower::util::ServiceExt;
use tubedigest_common::events::EventBus;

use tubedigest_server::models::{NewVideo, SummaryDraft, SummarySection};
use tubedigest_server::services::{
    ChannelCandidate, ChannelDetails, ChannelDirectory, SummarizeError, Summarizer,
    SummaryRequest, TranscriptError, TranscriptSource, VideoCatalog, YouTubeError,
};
use tubedigest_server::{AppState, ExternalServices, ServiceSettings};

pub fn candidate(channel_id: &str, title: &str, custom_url: Option<&str>) -> ChannelCandidate {
    ChannelCandidate {
        channel_id: channel_id.to_string(),
        title: title.to_string(),
        custom_url: custom_url.map(str::to_string),
        description: String::new(),
    }
}

pub fn upload(external_id: &str, day: u32) -> NewVideo {
    NewVideo {
        external_id: external_id.to_string(),
        title: format!("Upload {}", external_id),
        description: "video description".to_string(),
        thumbnail_url: None,
        published_at: Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap(),
        duration_seconds: Some(754),
        view_count: Some(1000),
    }
}

/// Scripted channel lookups and searches
#[derive(Default)]
pub struct FakeDirectory {
    pub usernames: HashMap<String, Vec<ChannelCandidate>>,
    pub searches: HashMap<String, Vec<ChannelCandidate>>,
    /// Every call fails with a network error
    pub offline: bool,
}

#[async_trait]
impl ChannelDirectory for FakeDirectory {
    async fn lookup_by_username(&self, username: &str) -> Result<Vec<ChannelCandidate>, YouTubeError> {
        if self.offline {
            return Err(YouTubeError::NetworkError("offline".to_string()));
        }
        Ok(self.usernames.get(username).cloned().unwrap_or_default())
    }

    async fn search_channels(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<ChannelCandidate>, YouTubeError> {
        if self.offline {
            return Err(YouTubeError::NetworkError("offline".to_string()));
        }
        let mut hits = self.searches.get(query).cloned().unwrap_or_default();
        hits.truncate(max_results as usize);
        Ok(hits)
    }
}

/// Channel details and uploads; uploads can change between polls
#[derive(Default)]
pub struct FakeCatalog {
    pub details: Mutex<HashMap<String, ChannelDetails>>,
    pub uploads: Mutex<HashMap<String, Vec<NewVideo>>>,
}

impl FakeCatalog {
    /// Register a channel with playlist `UU<rest of id>`
    pub fn add_channel(&self, channel_id: &str, title: &str) -> String {
        let playlist = format!("UU{}", channel_id.trim_start_matches("UC"));
        self.details.lock().unwrap().insert(
            channel_id.to_string(),
            ChannelDetails {
                channel_id: channel_id.to_string(),
                title: title.to_string(),
                description: format!("About {}", title),
                custom_url: None,
                thumbnail_url: None,
                uploads_playlist_id: Some(playlist.clone()),
            },
        );
        playlist
    }

    pub fn set_uploads(&self, playlist_id: &str, videos: Vec<NewVideo>) {
        self.uploads
            .lock()
            .unwrap()
            .insert(playlist_id.to_string(), videos);
    }
}

#[async_trait]
impl VideoCatalog for FakeCatalog {
    async fn channel_details(&self, channel_id: &str) -> Result<ChannelDetails, YouTubeError> {
        self.details
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .ok_or_else(|| YouTubeError::NotFound(format!("Channel {}", channel_id)))
    }

    async fn recent_uploads(
        &self,
        uploads_playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<NewVideo>, YouTubeError> {
        let mut videos = self
            .uploads
            .lock()
            .unwrap()
            .get(uploads_playlist_id)
            .cloned()
            .unwrap_or_default();
        videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        videos.truncate(max_results as usize);
        Ok(videos)
    }
}

/// Transcript for every video; ids listed in `failing` error out
#[derive(Default)]
pub struct FakeTranscripts {
    pub failing: Vec<String>,
}

#[async_trait]
impl TranscriptSource for FakeTranscripts {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>, TranscriptError> {
        if self.failing.iter().any(|id| id == video_id) {
            return Err(TranscriptError::ApiError(500));
        }
        Ok(Some(format!("[00:00] transcript of {}\n[01:05] more", video_id)))
    }
}

/// Summarizer that fails for titles containing "fail"
///
/// With a gate, every call waits for a permit first so tests can hold a
/// task inside the LLM stage.
#[derive(Default)]
pub struct FakeSummarizer {
    pub gate: Option<Arc<Semaphore>>,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeSummarizer {
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                gate: Some(gate.clone()),
                ..Self::default()
            },
            gate,
        )
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    fn model_name(&self) -> String {
        "fake-model".to_string()
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryDraft, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if request.title.contains("fail") {
            return Err(SummarizeError::ApiError(500, "model overloaded".to_string()));
        }

        Ok(SummaryDraft {
            title: format!("Summary of {}", request.title),
            core_theme: "A core theme".to_string(),
            content: "Summary body".to_string(),
            sections: vec![SummarySection {
                title: "Intro".to_string(),
                timestamp: Some("01:05".to_string()),
                content: "Opening remarks".to_string(),
                key_words: vec!["intro".to_string()],
            }],
            key_points: vec!["Point one".to_string()],
            insights: vec!["Insight".to_string()],
            tags: vec!["test".to_string()],
        })
    }
}

/// Fakes handed to the app, kept so tests can script and inspect them
pub struct TestServices {
    pub directory: Arc<FakeDirectory>,
    pub catalog: Arc<FakeCatalog>,
    pub transcripts: Arc<FakeTranscripts>,
    pub summarizer: Arc<FakeSummarizer>,
}

impl Default for TestServices {
    fn default() -> Self {
        Self {
            directory: Arc::new(FakeDirectory::default()),
            catalog: Arc::new(FakeCatalog::default()),
            transcripts: Arc::new(FakeTranscripts::default()),
            summarizer: Arc::new(FakeSummarizer::default()),
        }
    }
}

/// App state on a fresh in-memory database, no vault configured
pub async fn create_test_state(services: &TestServices, settings: ServiceSettings) -> AppState {
    let pool = tubedigest_common::db::init_memory_database()
        .await
        .expect("Failed to create in-memory database");

    AppState::new(
        pool,
        EventBus::new(100),
        ExternalServices {
            directory: services.directory.clone(),
            catalog: services.catalog.clone(),
            transcripts: services.transcripts.clone(),
            summarizer: services.summarizer.clone(),
            vault: None,
        },
        settings,
    )
}

pub async fn create_test_app(services: &TestServices) -> (Router, AppState) {
    let state = create_test_state(services, ServiceSettings::default()).await;
    (tubedigest_server::build_router(state.clone()), state)
}

/// Send a request, returning status and body (JSON when parseable)
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

/// Poll until `check` holds or ~2 seconds pass
pub async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}
