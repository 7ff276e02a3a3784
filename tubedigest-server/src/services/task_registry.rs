//! Registry of background summary tasks
//!
//! Owned by the application state. Each task is keyed by a string (one key
//! per video) and carries its own child `CancellationToken`, so cancelling
//! the service's root token cancels every task. Every state change is
//! broadcast as a `TaskUpdated` event.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tubedigest_common::events::{EventBus, TaskStage, TubeDigestEvent};
use uuid::Uuid;

use crate::models::TaskSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("A summary task is already running for {0}")]
    AlreadyRunning(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {0} has already finished")]
    AlreadyFinished(String),
}

struct TaskEntry {
    snapshot: TaskSnapshot,
    token: CancellationToken,
}

/// Shared registry; clones refer to the same tasks
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, TaskEntry>>>,
    event_bus: EventBus,
    root_token: CancellationToken,
}

impl TaskRegistry {
    /// `root_token` is the service shutdown token
    pub fn new(event_bus: EventBus, root_token: CancellationToken) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            event_bus,
            root_token,
        }
    }

    /// Key of the summary task for a video
    pub fn summary_key(video_guid: Uuid) -> String {
        format!("summary:{}", video_guid)
    }

    /// Register a queued task
    ///
    /// Fails while another task with the same key is still active; a
    /// finished task with the same key is replaced.
    pub async fn register(
        &self,
        key: &str,
        video_guid: Uuid,
        video_title: &str,
    ) -> Result<TaskHandle, TaskError> {
        let now = Utc::now();
        let token = self.root_token.child_token();
        let snapshot = TaskSnapshot {
            task_key: key.to_string(),
            video_guid,
            video_title: video_title.to_string(),
            stage: TaskStage::Queued,
            message: None,
            summary_guid: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        };

        {
            let mut tasks = self.tasks.write().await;
            if let Some(existing) = tasks.get(key) {
                if !existing.snapshot.stage.is_terminal() {
                    return Err(TaskError::AlreadyRunning(key.to_string()));
                }
            }
            tasks.insert(
                key.to_string(),
                TaskEntry {
                    snapshot: snapshot.clone(),
                    token: token.clone(),
                },
            );
        }

        tracing::debug!(task_key = %key, video_guid = %video_guid, "Task registered");
        self.publish(&snapshot);

        Ok(TaskHandle {
            key: key.to_string(),
            token,
            registry: self.clone(),
        })
    }

    /// Move an active task to another stage
    ///
    /// Terminal tasks are left untouched; returns whether anything changed.
    pub async fn update_stage(&self, key: &str, stage: TaskStage) -> bool {
        self.transition(key, |snapshot| {
            snapshot.stage = stage;
        })
        .await
    }

    /// Mark a task completed with the stored summary
    pub async fn complete(&self, key: &str, summary_guid: Uuid) -> bool {
        self.transition(key, |snapshot| {
            snapshot.stage = TaskStage::Completed;
            snapshot.summary_guid = Some(summary_guid);
        })
        .await
    }

    /// Mark a task failed
    pub async fn fail(&self, key: &str, message: &str) -> bool {
        self.transition(key, |snapshot| {
            snapshot.stage = TaskStage::Failed;
            snapshot.message = Some(message.to_string());
        })
        .await
    }

    /// Record that the pipeline observed cancellation
    pub async fn mark_cancelled(&self, key: &str) -> bool {
        self.transition(key, |snapshot| {
            snapshot.stage = TaskStage::Cancelled;
        })
        .await
    }

    /// Request cancellation of an active task
    ///
    /// The pipeline stops at its next stage boundary; until then the task
    /// reports `cancel_requested`.
    pub async fn cancel(&self, key: &str) -> Result<TaskSnapshot, TaskError> {
        let snapshot = {
            let mut tasks = self.tasks.write().await;
            let entry = tasks
                .get_mut(key)
                .ok_or_else(|| TaskError::NotFound(key.to_string()))?;
            if entry.snapshot.stage.is_terminal() {
                return Err(TaskError::AlreadyFinished(key.to_string()));
            }
            entry.token.cancel();
            entry.snapshot.cancel_requested = true;
            entry.snapshot.updated_at = Utc::now();
            entry.snapshot.clone()
        };

        tracing::info!(task_key = %key, "Task cancellation requested");
        self.publish(&snapshot);
        Ok(snapshot)
    }

    pub async fn get(&self, key: &str) -> Option<TaskSnapshot> {
        self.tasks.read().await.get(key).map(|e| e.snapshot.clone())
    }

    /// All tasks, oldest first
    pub async fn snapshot(&self) -> Vec<TaskSnapshot> {
        let mut all: Vec<TaskSnapshot> = self
            .tasks
            .read()
            .await
            .values()
            .map(|e| e.snapshot.clone())
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    /// Drop finished tasks last updated before `now - older_than`
    pub async fn evict_finished(&self, older_than: Duration) -> usize {
        self.evict_finished_at(Utc::now(), older_than).await
    }

    async fn evict_finished_at(&self, now: DateTime<Utc>, older_than: Duration) -> usize {
        // Out-of-range cutoff: nothing is that old
        let Some(cutoff) = now.checked_sub_signed(older_than) else {
            return 0;
        };
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, e| !(e.snapshot.stage.is_terminal() && e.snapshot.updated_at <= cutoff));
        let evicted = before - tasks.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted finished tasks");
        }
        evicted
    }

    async fn transition(&self, key: &str, apply: impl FnOnce(&mut TaskSnapshot)) -> bool {
        let snapshot = {
            let mut tasks = self.tasks.write().await;
            let Some(entry) = tasks.get_mut(key) else {
                return false;
            };
            if entry.snapshot.stage.is_terminal() {
                return false;
            }
            apply(&mut entry.snapshot);
            entry.snapshot.updated_at = Utc::now();
            entry.snapshot.clone()
        };

        self.publish(&snapshot);
        true
    }

    fn publish(&self, snapshot: &TaskSnapshot) {
        self.event_bus.emit_lossy(TubeDigestEvent::TaskUpdated {
            task_key: snapshot.task_key.clone(),
            video_guid: snapshot.video_guid,
            stage: snapshot.stage,
            message: snapshot.message.clone(),
            summary_guid: snapshot.summary_guid,
            timestamp: snapshot.updated_at,
        });
    }
}

/// A registered task, held by whoever runs it
#[derive(Clone)]
pub struct TaskHandle {
    key: String,
    token: CancellationToken,
    registry: TaskRegistry,
}

impl TaskHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn set_stage(&self, stage: TaskStage) {
        self.registry.update_stage(&self.key, stage).await;
    }

    pub async fn complete(&self, summary_guid: Uuid) {
        self.registry.complete(&self.key, summary_guid).await;
    }

    pub async fn fail(&self, message: &str) {
        self.registry.fail(&self.key, message).await;
    }

    pub async fn mark_cancelled(&self) {
        self.registry.mark_cancelled(&self.key).await;
    }
}
