//! Event types for the TubeDigest event system
//!
//! Provides the shared event enum and the EventBus used by the server's
//! background tasks (summary pipeline, poller) and the SSE endpoint.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Lifecycle stage of a background summary task
///
/// Stages advance in order; cancellation is only observed between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    /// Registered, waiting for a worker slot
    Queued,
    FetchingTranscript,
    Summarizing,
    Saving,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStage {
    /// Terminal stages never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStage::Completed | TaskStage::Failed | TaskStage::Cancelled
        )
    }
}

/// TubeDigest event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TubeDigestEvent {
    /// A summary task changed stage
    TaskUpdated {
        task_key: String,
        video_guid: Uuid,
        stage: TaskStage,
        /// Error text for failed tasks
        message: Option<String>,
        /// Set once the summary row is written
        summary_guid: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A channel was resolved and registered
    ChannelRegistered {
        channel_guid: Uuid,
        external_id: String,
        name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Polling found new uploads for a channel
    VideosDiscovered {
        channel_guid: Uuid,
        channel_name: String,
        new_videos: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A bulk summarization request finished
    BulkSummaryFinished {
        channel_guid: Uuid,
        succeeded: usize,
        failed: usize,
        cancelled: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TubeDigestEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            TubeDigestEvent::TaskUpdated { .. } => "TaskUpdated",
            TubeDigestEvent::ChannelRegistered { .. } => "ChannelRegistered",
            TubeDigestEvent::VideosDiscovered { .. } => "VideosDiscovered",
            TubeDigestEvent::BulkSummaryFinished { .. } => "BulkSummaryFinished",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks, slow
/// subscribers observe `Lagged` and skip ahead.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TubeDigestEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TubeDigestEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TubeDigestEvent,
    ) -> Result<usize, broadcast::error::SendError<TubeDigestEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TubeDigestEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(10);
        let result = bus.emit(TubeDigestEvent::VideosDiscovered {
            channel_guid: Uuid::new_v4(),
            channel_name: "test".to_string(),
            new_videos: 1,
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
        assert_eq!(bus.capacity(), 10);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let video_guid = Uuid::new_v4();
        bus.emit_lossy(TubeDigestEvent::TaskUpdated {
            task_key: "video:abc".to_string(),
            video_guid,
            stage: TaskStage::Summarizing,
            message: None,
            summary_guid: None,
            timestamp: chrono::Utc::now(),
        });

        match rx.recv().await.unwrap() {
            TubeDigestEvent::TaskUpdated { stage, video_guid: got, .. } => {
                assert_eq!(stage, TaskStage::Summarizing);
                assert_eq!(got, video_guid);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = TubeDigestEvent::BulkSummaryFinished {
            channel_guid: Uuid::nil(),
            succeeded: 2,
            failed: 1,
            cancelled: 0,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BulkSummaryFinished");
        assert_eq!(json["succeeded"], 2);
        assert_eq!(event.event_type(), "BulkSummaryFinished");
    }

    #[test]
    fn test_terminal_stages() {
        assert!(TaskStage::Completed.is_terminal());
        assert!(TaskStage::Failed.is_terminal());
        assert!(TaskStage::Cancelled.is_terminal());
        assert!(!TaskStage::Saving.is_terminal());
        assert!(!TaskStage::Queued.is_terminal());
    }
}
