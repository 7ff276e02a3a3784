//! tubedigest-server - YouTube channel summarizer service
//!
//! Registers channels from pasted URLs, polls them for new uploads,
//! summarizes videos through an LLM and exports the summaries as Markdown.
//! Port 5780 by default; JSON API plus SSE at `/events`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tubedigest_common::config::{
    load_toml_config_or_default, resolve_config_path, CompiledDefaults, DataFolderInitializer,
    DataFolderResolver, LoggingConfig,
};
use tubedigest_common::events::EventBus;

use tubedigest_server::config::RuntimeSecrets;
use tubedigest_server::services::{
    LlmClient, TimedTextClient, VaultClient, YouTubeClient,
};
use tubedigest_server::{AppState, ExternalServices, ServiceSettings};

/// Finished tasks are swept at least this often
const MAX_SWEEP_PERIOD_SECS: u64 = 3600;

/// Command-line arguments for tubedigest-server
#[derive(Parser, Debug)]
#[command(name = "tubedigest-server")]
#[command(about = "YouTube channel summarizer service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "TUBEDIGEST_PORT")]
    port: Option<u16>,

    /// Folder holding the database
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Subscriber honoring `RUST_LOG`, else the TOML level; optional log file
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            format!("tubedigest_server={0},tubedigest_common={0},tower_http=info", logging.level).into()
        });

    let registry = tracing_subscriber::registry().with(filter);
    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .init();
        }
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config = load_toml_config_or_default(config_path.as_deref());
    init_tracing(&toml_config.logging)?;

    info!(
        "Starting tubedigest-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Data folder and database
    let data_folder = DataFolderResolver::new("tubedigest-server")
        .with_cli_arg(args.data_folder)
        .with_toml(&toml_config)
        .resolve();
    let initializer = DataFolderInitializer::new(data_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize data folder: {}", e))?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = tubedigest_server::db::init_database_pool(&db_path).await?;

    // Secrets: database → environment → TOML
    let secrets = RuntimeSecrets::load(&db_pool, &toml_config).await?;

    // External clients
    let youtube = Arc::new(YouTubeClient::new(secrets.youtube.clone())?);
    let transcripts = Arc::new(TimedTextClient::new(
        toml_config.summaries.transcript_languages.clone(),
    )?);
    let summarizer = Arc::new(LlmClient::new(&toml_config.llm, secrets.llm.clone())?);
    let (vault, vault_error) = match VaultClient::from_config(&toml_config.vault, secrets.vault.clone()) {
        Ok(Some(client)) => {
            info!("Vault export enabled: {}", toml_config.vault.base_url.as_deref().unwrap_or_default());
            (Some(Arc::new(client)), None)
        }
        Ok(None) => {
            info!("No vault configured; exports are served as downloads");
            (None, None)
        }
        Err(e) => {
            warn!("Vault client unavailable, exports are served as downloads: {}", e);
            (None, Some(format!("Vault client unavailable: {}", e)))
        }
    };

    let event_bus = EventBus::new(256);
    let state = AppState::new(
        db_pool,
        event_bus,
        ExternalServices {
            directory: youtube.clone(),
            catalog: youtube,
            transcripts,
            summarizer,
            vault,
        },
        ServiceSettings {
            summaries: toml_config.summaries.clone(),
            polling: toml_config.polling.clone(),
            config_path,
            secrets,
        },
    );
    if let Some(message) = vault_error {
        state.record_error(message).await;
    }

    // Background poller
    if toml_config.polling.enabled {
        let period = Duration::from_secs(toml_config.polling.interval_seconds.max(1));
        tokio::spawn(state.poller().run(period, state.shutdown.clone()));
    } else {
        info!("Video polling disabled");
    }

    // Finished task sweeper
    {
        let tasks = state.tasks.clone();
        let shutdown = state.shutdown.clone();
        let ttl = toml_config.summaries.task_ttl();
        let period = toml_config
            .summaries
            .task_ttl_seconds
            .clamp(1, MAX_SWEEP_PERIOD_SECS);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(period));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        tasks.evict_finished(ttl).await;
                    }
                }
            }
        });
    }

    let defaults = CompiledDefaults::for_current_platform();
    let bind_address = toml_config.bind_address.clone().unwrap_or(defaults.bind_address);
    let port = args.port.or(toml_config.port).unwrap_or(defaults.port);
    let addr = format!("{}:{}", bind_address, port);

    let shutdown = state.shutdown.clone();
    let app = tubedigest_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await?;

    info!("tubedigest-server stopped");
    Ok(())
}
