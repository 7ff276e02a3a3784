//! Background polling for new uploads
//!
//! A periodic sweep picks active channels whose polling interval has
//! elapsed, stores any uploads not seen before and optionally queues them
//! for summarization. One channel failing does not stop the sweep.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tubedigest_common::events::{EventBus, TubeDigestEvent};

use super::summary_pipeline::SummaryPipeline;
use super::youtube_client::{VideoCatalog, YouTubeError};
use crate::db;
use crate::models::{Channel, Video};

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    YouTube(#[from] YouTubeError),

    #[error(transparent)]
    Database(#[from] tubedigest_common::Error),

    #[error("Channel {0} has no uploads playlist")]
    NoUploadsPlaylist(String),
}

/// Result of one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub channels_checked: usize,
    pub channels_failed: usize,
    pub new_videos: usize,
}

/// Upload poller
#[derive(Clone)]
pub struct VideoPoller {
    db: SqlitePool,
    catalog: Arc<dyn VideoCatalog>,
    event_bus: EventBus,
    max_results: u32,
    /// Set when new uploads are summarized automatically
    auto_summarize: Option<SummaryPipeline>,
}

impl VideoPoller {
    pub fn new(
        db: SqlitePool,
        catalog: Arc<dyn VideoCatalog>,
        event_bus: EventBus,
        max_results: u32,
        auto_summarize: Option<SummaryPipeline>,
    ) -> Self {
        Self {
            db,
            catalog,
            event_bus,
            max_results: max_results.clamp(1, 50),
            auto_summarize,
        }
    }

    /// Fetch recent uploads for one channel and store the new ones
    pub async fn poll_channel(&self, channel: &Channel) -> Result<Vec<Video>, PollError> {
        let playlist_id = match &channel.uploads_playlist_id {
            Some(id) => id.clone(),
            None => {
                let details = self.catalog.channel_details(&channel.external_id).await?;
                let id = details
                    .uploads_playlist_id
                    .ok_or_else(|| PollError::NoUploadsPlaylist(channel.external_id.clone()))?;
                db::channels::set_uploads_playlist(&self.db, channel.guid, &id).await?;
                id
            }
        };

        let uploads = self.catalog.recent_uploads(&playlist_id, self.max_results).await?;

        let mut new_videos = Vec::new();
        for upload in &uploads {
            if let Some(video) = db::videos::insert_if_new(&self.db, channel.guid, upload).await? {
                new_videos.push(video);
            }
        }

        db::channels::mark_checked(&self.db, channel.guid, Utc::now()).await?;

        tracing::info!(
            channel = %channel.name,
            fetched = uploads.len(),
            new_videos = new_videos.len(),
            "Channel polled"
        );

        if !new_videos.is_empty() {
            self.event_bus.emit_lossy(TubeDigestEvent::VideosDiscovered {
                channel_guid: channel.guid,
                channel_name: channel.name.clone(),
                new_videos: new_videos.len(),
                timestamp: Utc::now(),
            });

            if let Some(pipeline) = &self.auto_summarize {
                for video in &new_videos {
                    if let Err(e) = pipeline.submit(video.clone()).await {
                        tracing::debug!(video_id = %video.external_id, error = %e, "Auto-summary not queued");
                    }
                }
            }
        }

        Ok(new_videos)
    }

    /// Poll every channel that is due at `now`
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, PollError> {
        let channels = db::channels::list_channels(&self.db).await?;
        let mut report = SweepReport::default();

        for channel in channels.iter().filter(|c| c.is_due(now)) {
            report.channels_checked += 1;
            match self.poll_channel(channel).await {
                Ok(videos) => report.new_videos += videos.len(),
                Err(e) => {
                    report.channels_failed += 1;
                    tracing::warn!(channel = %channel.name, error = %e, "Channel poll failed");
                }
            }
        }

        if report.channels_checked > 0 {
            tracing::debug!(
                checked = report.channels_checked,
                failed = report.channels_failed,
                new_videos = report.new_videos,
                "Poll sweep finished"
            );
        }

        Ok(report)
    }

    /// Sweep every `period` until `shutdown` is cancelled
    pub async fn run(self, period: Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(period_seconds = period.as_secs(), "Video poller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Video poller stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep(Utc::now()).await {
                        tracing::error!(error = %e, "Poll sweep failed");
                    }
                }
            }
        }
    }
}
