//! Collecting summaries into exportable notes
//!
//! Shared by the export API and the `tubedigest-export` binary.

use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tubedigest_common::Result;
use uuid::Uuid;

use super::markdown::{unique_path, ExportNote};
use crate::db;
use crate::models::Summary;

/// Display name of a summary's channel, falling back to the channel guid
pub async fn channel_name(pool: &SqlitePool, channel_guid: Uuid) -> Result<String> {
    Ok(db::channels::get_channel(pool, channel_guid)
        .await?
        .map(|c| c.name)
        .unwrap_or_else(|| channel_guid.to_string()))
}

/// Note for one summary
pub async fn note_for_summary(pool: &SqlitePool, summary: &Summary) -> Result<ExportNote> {
    let name = channel_name(pool, summary.channel_guid).await?;
    Ok(ExportNote::for_summary(summary, &name))
}

/// Notes for every summary, or one channel's summaries
pub async fn collect_notes(pool: &SqlitePool, channel_guid: Option<Uuid>) -> Result<Vec<ExportNote>> {
    let summaries = db::summaries::list_summaries(pool, channel_guid).await?;
    let names: HashMap<Uuid, String> = db::channels::list_channels(pool)
        .await?
        .into_iter()
        .map(|c| (c.guid, c.name))
        .collect();

    Ok(summaries
        .iter()
        .map(|summary| {
            let name = names
                .get(&summary.channel_guid)
                .cloned()
                .unwrap_or_else(|| summary.channel_guid.to_string());
            ExportNote::for_summary(summary, &name)
        })
        .collect())
}

/// Write notes below `dir` in per-channel folders; returns the written paths
///
/// Notes sharing a folder and file name get ` (2)`, ` (3)`... suffixes,
/// matching the zip export.
pub fn write_notes_to_dir(notes: &[ExportNote], dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(notes.len());
    let mut used: HashMap<&str, HashSet<String>> = HashMap::new();
    for note in notes {
        let folder = dir.join(&note.folder);
        std::fs::create_dir_all(&folder)?;
        let file_name = unique_path(
            note.file_name.clone(),
            used.entry(note.folder.as_str()).or_default(),
        );
        let path = folder.join(file_name);
        std::fs::write(&path, &note.markdown)?;
        written.push(path);
    }
    Ok(written)
}
