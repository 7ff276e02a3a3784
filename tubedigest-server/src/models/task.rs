//! Background summary task state

use chrono::{DateTime, Utc};
use serde::Serialize;
use tubedigest_common::events::TaskStage;
use uuid::Uuid;

/// Point-in-time view of a registered task
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub task_key: String,
    pub video_guid: Uuid,
    pub video_title: String,
    pub stage: TaskStage,
    /// Error text for failed tasks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_guid: Option<Uuid>,
    /// Cancellation was requested but not yet observed by the pipeline
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate result of a bulk summarization run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BulkOutcome {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}
