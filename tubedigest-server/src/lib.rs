//! tubedigest-server library interface
//!
//! Exposes the application state and router so integration tests can drive
//! the HTTP API with in-process fakes for every external service.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tubedigest_common::config::{PollingConfig, SummariesConfig};
use tubedigest_common::events::EventBus;

use crate::config::RuntimeSecrets;
use crate::services::{
    ChannelDirectory, ChannelResolver, Summarizer, SummaryPipeline, TaskRegistry,
    TranscriptSource, VaultClient, VideoCatalog, VideoPoller,
};

/// External collaborators, injected so tests can substitute fakes
pub struct ExternalServices {
    pub directory: Arc<dyn ChannelDirectory>,
    pub catalog: Arc<dyn VideoCatalog>,
    pub transcripts: Arc<dyn TranscriptSource>,
    pub summarizer: Arc<dyn Summarizer>,
    /// `None` when no vault is configured; exports become downloads
    pub vault: Option<Arc<VaultClient>>,
}

/// Tunables taken from the TOML config
#[derive(Debug, Clone, Default)]
pub struct ServiceSettings {
    pub summaries: SummariesConfig,
    pub polling: PollingConfig,
    /// TOML file that secret updates are synced back to
    pub config_path: Option<PathBuf>,
    pub secrets: RuntimeSecrets,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub directory: Arc<dyn ChannelDirectory>,
    pub catalog: Arc<dyn VideoCatalog>,
    pub pipeline: SummaryPipeline,
    pub tasks: TaskRegistry,
    pub vault: Option<Arc<VaultClient>>,
    pub settings: ServiceSettings,
    /// Cancelled on shutdown; parent of every task token
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        services: ExternalServices,
        settings: ServiceSettings,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let tasks = TaskRegistry::new(event_bus.clone(), shutdown.clone());
        let pipeline = SummaryPipeline::new(
            db.clone(),
            services.transcripts,
            services.summarizer,
            tasks.clone(),
            event_bus.clone(),
            settings.summaries.max_concurrent,
        );

        Self {
            db,
            event_bus,
            directory: services.directory,
            catalog: services.catalog,
            pipeline,
            tasks,
            vault: services.vault,
            settings,
            shutdown,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn resolver(&self) -> ChannelResolver {
        ChannelResolver::new(self.directory.clone())
    }

    /// Poller sharing this state's database, catalog and pipeline
    pub fn poller(&self) -> VideoPoller {
        let auto_summarize = self
            .settings
            .polling
            .auto_summarize
            .then(|| self.pipeline.clone());
        VideoPoller::new(
            self.db.clone(),
            self.catalog.clone(),
            self.event_bus.clone(),
            self.settings.polling.max_results,
            auto_summarize,
        )
    }

    /// Remember an error for the health endpoint
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::channel_routes())
        .merge(api::video_routes())
        .merge(api::summary_routes())
        .merge(api::task_routes())
        .merge(api::export_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
