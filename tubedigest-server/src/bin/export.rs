//! Offline Markdown export
//!
//! Writes every stored summary (or one channel's) as Markdown notes in
//! per-channel folders, or as a single zip archive with `--zip`.
//!
//! **Usage:**
//! ```bash
//! tubedigest-export --output ./notes [--channel UC...] [--zip]
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tubedigest_common::config::{
    load_toml_config_or_default, resolve_config_path, DataFolderInitializer, DataFolderResolver,
};
use uuid::Uuid;

use tubedigest_server::db;
use tubedigest_server::services::{archive, exporter};

/// Export stored summaries as Markdown
#[derive(Parser, Debug)]
#[command(name = "tubedigest-export")]
#[command(about = "Export TubeDigest summaries as Markdown files or a zip archive")]
#[command(version)]
struct Args {
    /// Output directory, or archive path with --zip
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    /// Only this channel (guid or YouTube channel id)
    #[arg(long)]
    channel: Option<String>,

    /// Write one zip archive instead of a directory tree
    #[arg(long)]
    zip: bool,

    /// Folder holding the database
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config = load_toml_config_or_default(config_path.as_deref());
    let data_folder = DataFolderResolver::new("tubedigest-export")
        .with_cli_arg(args.data_folder)
        .with_toml(&toml_config)
        .resolve();

    let db_path = DataFolderInitializer::new(data_folder).database_path();
    if !db_path.exists() {
        bail!("No database at {}", db_path.display());
    }
    let pool = db::init_database_pool(&db_path).await?;

    let channel_guid = match args.channel.as_deref() {
        None => None,
        Some(id) => {
            let channel = match Uuid::parse_str(id) {
                Ok(guid) => db::channels::get_channel(&pool, guid).await?,
                Err(_) => db::channels::get_channel_by_external_id(&pool, id).await?,
            };
            match channel {
                Some(channel) => Some(channel.guid),
                None => bail!("Unknown channel: {}", id),
            }
        }
    };

    let notes = exporter::collect_notes(&pool, channel_guid).await?;
    if notes.is_empty() {
        info!("No summaries to export");
        return Ok(());
    }

    if args.zip {
        let bytes = archive::build_zip(&notes).context("Building archive failed")?;
        if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&args.output, &bytes)
            .with_context(|| format!("Writing {} failed", args.output.display()))?;
        info!("Wrote {} notes to {}", notes.len(), args.output.display());
    } else {
        let written = exporter::write_notes_to_dir(&notes, &args.output)?;
        info!("Wrote {} notes below {}", written.len(), args.output.display());
    }

    Ok(())
}
