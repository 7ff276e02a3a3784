//! Markdown export endpoints
//!
//! A single summary goes to the configured vault, or comes back as a
//! Markdown attachment when no vault is set up or `?download=true` is given.
//! `export-all` always returns a zip archive.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::channels::load_channel;
use crate::db;
use crate::services::{archive, exporter};
use crate::{ApiError, ApiResult, AppState};

const ZIP_FILE_NAME: &str = "tubedigest-export.zip";

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub download: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportAllParams {
    pub channel_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct VaultPushResponse {
    pub pushed: bool,
    /// Vault-relative path of the written note
    pub path: String,
}

/// `Content-Disposition` value carrying both an ASCII and a UTF-8 file name
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(file_name)
    )
}

fn attachment(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(file_name)),
        ],
        body,
    )
        .into_response()
}

/// GET /api/export/:id
pub async fn export_summary(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let summary = db::summaries::get_summary(&state.db, guid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Summary {}", guid)))?;
    let note = exporter::note_for_summary(&state.db, &summary).await?;

    match (&state.vault, params.download) {
        (Some(vault), false) => {
            let path = vault
                .push_note(&note.folder, &note.file_name, &note.markdown)
                .await?;
            info!(summary_guid = %guid, path = %path, "Summary pushed to vault");
            Ok(Json(VaultPushResponse { pushed: true, path }).into_response())
        }
        _ => Ok(attachment(
            "text/markdown; charset=utf-8",
            &note.file_name,
            note.markdown.into_bytes(),
        )),
    }
}

/// GET /api/export-all?channel_id=
pub async fn export_all(
    State(state): State<AppState>,
    Query(params): Query<ExportAllParams>,
) -> ApiResult<Response> {
    if let Some(channel_guid) = params.channel_id {
        load_channel(&state, channel_guid).await?;
    }

    let notes = exporter::collect_notes(&state.db, params.channel_id).await?;
    let bytes = archive::build_zip(&notes)
        .map_err(|e| ApiError::Internal(format!("Building archive failed: {}", e)))?;

    info!(notes = notes.len(), bytes = bytes.len(), "Export archive built");
    Ok(attachment("application/zip", ZIP_FILE_NAME, bytes))
}

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/api/export/:id", get(export_summary))
        .route("/api/export-all", get(export_all))
}
