//! Summary endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::models::Summary;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct SummaryFilter {
    pub channel_id: Option<Uuid>,
}

/// GET /api/summaries?channel_id=
pub async fn list_summaries(
    State(state): State<AppState>,
    Query(filter): Query<SummaryFilter>,
) -> ApiResult<Json<Vec<Summary>>> {
    Ok(Json(db::summaries::list_summaries(&state.db, filter.channel_id).await?))
}

/// GET /api/summaries/:id
pub async fn get_summary(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
) -> ApiResult<Json<Summary>> {
    db::summaries::get_summary(&state.db, guid)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Summary {}", guid)))
}

/// DELETE /api/summaries/:id
pub async fn delete_summary(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if db::summaries::delete_summary(&state.db, guid).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Summary {}", guid)))
    }
}

pub fn summary_routes() -> Router<AppState> {
    Router::new()
        .route("/api/summaries", get(list_summaries))
        .route("/api/summaries/:id", get(get_summary).delete(delete_summary))
}
