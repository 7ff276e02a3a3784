//! Summary generation pipeline
//!
//! Runs one video through transcript fetch → LLM call → persistence write,
//! reporting each stage to the [`TaskRegistry`]. Cancellation is checked
//! only at stage boundaries: an LLM call in flight runs to completion, but
//! its result is discarded if cancellation arrived meanwhile.

use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tubedigest_common::events::{EventBus, TaskStage, TubeDigestEvent};
use uuid::Uuid;

use super::summarizer::{Summarizer, SummaryRequest};
use super::task_registry::{TaskError, TaskHandle, TaskRegistry};
use super::transcript::TranscriptSource;
use crate::db;
use crate::models::{BulkOutcome, Summary, Video};

/// How a single pipeline run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed(Uuid),
    Failed(String),
    Cancelled,
}

/// Summary pipeline and its collaborators
#[derive(Clone)]
pub struct SummaryPipeline {
    db: SqlitePool,
    transcripts: Arc<dyn TranscriptSource>,
    summarizer: Arc<dyn Summarizer>,
    registry: TaskRegistry,
    event_bus: EventBus,
    max_concurrent: usize,
}

impl SummaryPipeline {
    pub fn new(
        db: SqlitePool,
        transcripts: Arc<dyn TranscriptSource>,
        summarizer: Arc<dyn Summarizer>,
        registry: TaskRegistry,
        event_bus: EventBus,
        max_concurrent: usize,
    ) -> Self {
        Self {
            db,
            transcripts,
            summarizer,
            registry,
            event_bus,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Run all stages for a registered task
    pub async fn run(&self, handle: TaskHandle, video: Video) -> PipelineOutcome {
        match self.run_stages(&handle, &video).await {
            Ok(Some(summary_guid)) => {
                tracing::info!(
                    task_key = %handle.key(),
                    video_id = %video.external_id,
                    summary_guid = %summary_guid,
                    "Summary completed"
                );
                handle.complete(summary_guid).await;
                PipelineOutcome::Completed(summary_guid)
            }
            Ok(None) => {
                tracing::info!(task_key = %handle.key(), "Summary task cancelled");
                handle.mark_cancelled().await;
                PipelineOutcome::Cancelled
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    task_key = %handle.key(),
                    video_id = %video.external_id,
                    error = %message,
                    "Summary task failed"
                );
                handle.fail(&message).await;
                PipelineOutcome::Failed(message)
            }
        }
    }

    /// `Ok(None)` when cancellation was observed at a stage boundary
    async fn run_stages(&self, handle: &TaskHandle, video: &Video) -> anyhow::Result<Option<Uuid>> {
        if handle.is_cancelled() {
            return Ok(None);
        }
        handle.set_stage(TaskStage::FetchingTranscript).await;

        let transcript = match self.transcripts.fetch_transcript(&video.external_id).await {
            Ok(transcript) => transcript,
            Err(e) => {
                tracing::warn!(
                    video_id = %video.external_id,
                    error = %e,
                    "Transcript fetch failed; summarizing without it"
                );
                None
            }
        };

        if handle.is_cancelled() {
            return Ok(None);
        }
        handle.set_stage(TaskStage::Summarizing).await;

        let request = SummaryRequest {
            title: video.title.clone(),
            description: video.description.clone(),
            transcript,
        };
        let draft = self.summarizer.summarize(&request).await?;

        if handle.is_cancelled() {
            return Ok(None);
        }
        handle.set_stage(TaskStage::Saving).await;

        let summary = Summary::from_draft(draft, video, &self.summarizer.model_name());
        db::summaries::insert_summary(&self.db, &summary).await?;

        Ok(Some(summary.guid))
    }

    /// Register and start a summary task for one video
    ///
    /// Returns the task key; fails if the video already has an active task.
    pub async fn submit(&self, video: Video) -> Result<String, TaskError> {
        let key = TaskRegistry::summary_key(video.guid);
        let handle = self.registry.register(&key, video.guid, &video.title).await?;
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run(handle, video).await });
        Ok(key)
    }

    /// Register every video and run them with bounded concurrency
    ///
    /// Videos that already have an active task are skipped. Returns the keys
    /// of the registered tasks and the join handle of the bulk run.
    pub async fn submit_bulk(
        &self,
        channel_guid: Uuid,
        videos: Vec<Video>,
    ) -> (Vec<String>, JoinHandle<BulkOutcome>) {
        let mut jobs = Vec::with_capacity(videos.len());
        for video in videos {
            let key = TaskRegistry::summary_key(video.guid);
            match self.registry.register(&key, video.guid, &video.title).await {
                Ok(handle) => jobs.push((handle, video)),
                Err(e) => tracing::debug!(task_key = %key, error = %e, "Skipping video"),
            }
        }

        let keys = jobs.iter().map(|(h, _)| h.key().to_string()).collect();
        let pipeline = self.clone();
        let join = tokio::spawn(async move { pipeline.run_bulk(channel_guid, jobs).await });
        (keys, join)
    }

    /// Run registered jobs, at most `max_concurrent` at a time
    pub async fn run_bulk(&self, channel_guid: Uuid, jobs: Vec<(TaskHandle, Video)>) -> BulkOutcome {
        let total = jobs.len();
        tracing::info!(
            channel_guid = %channel_guid,
            videos = total,
            max_concurrent = self.max_concurrent,
            "Bulk summarization started"
        );

        let outcomes: Vec<PipelineOutcome> = stream::iter(jobs)
            .map(|(handle, video)| {
                let pipeline = self.clone();
                async move { pipeline.run(handle, video).await }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut outcome = BulkOutcome::default();
        for result in outcomes {
            match result {
                PipelineOutcome::Completed(_) => outcome.succeeded += 1,
                PipelineOutcome::Failed(_) => outcome.failed += 1,
                PipelineOutcome::Cancelled => outcome.cancelled += 1,
            }
        }

        tracing::info!(
            channel_guid = %channel_guid,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            cancelled = outcome.cancelled,
            "Bulk summarization finished"
        );

        self.event_bus.emit_lossy(TubeDigestEvent::BulkSummaryFinished {
            channel_guid,
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            cancelled: outcome.cancelled,
            timestamp: chrono::Utc::now(),
        });

        outcome
    }
}
