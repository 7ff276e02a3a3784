//! Video endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::channels::load_channel;
use crate::db;
use crate::models::{Video, VideoListing};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub task_key: String,
    pub video_guid: Uuid,
}

async fn load_video(state: &AppState, guid: Uuid) -> ApiResult<Video> {
    db::videos::get_video(&state.db, guid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Video {}", guid)))
}

/// GET /api/channels/:id/videos
///
/// Newest first, each with its latest summary id if any.
pub async fn list_channel_videos(
    State(state): State<AppState>,
    Path(channel_guid): Path<Uuid>,
) -> ApiResult<Json<Vec<VideoListing>>> {
    load_channel(&state, channel_guid).await?;
    Ok(Json(db::videos::list_by_channel(&state.db, channel_guid).await?))
}

/// GET /api/videos/:id
pub async fn get_video(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
) -> ApiResult<Json<Video>> {
    Ok(Json(load_video(&state, guid).await?))
}

/// DELETE /api/videos/:id
///
/// Summaries of the video are kept.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if db::videos::delete_video(&state.db, guid).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Video {}", guid)))
    }
}

/// POST /api/videos/:id/summarize
///
/// 202 with the task key; 409 while a task for the video is still active.
pub async fn summarize_video(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<SummarizeResponse>)> {
    let video = load_video(&state, guid).await?;
    let task_key = state.pipeline.submit(video).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SummarizeResponse {
            task_key,
            video_guid: guid,
        }),
    ))
}

/// Build video routes
pub fn video_routes() -> Router<AppState> {
    Router::new()
        .route("/api/channels/:id/videos", get(list_channel_videos))
        .route("/api/videos/:id", get(get_video).delete(delete_video))
        .route("/api/videos/:id/summarize", post(summarize_video))
}
