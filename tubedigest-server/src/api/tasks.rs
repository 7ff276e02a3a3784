//! Background task inspection and cancellation

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::models::TaskSnapshot;
use crate::{ApiError, ApiResult, AppState};

/// GET /api/tasks
pub async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskSnapshot>> {
    Json(state.tasks.snapshot().await)
}

/// GET /api/tasks/:key
pub async fn get_task(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<TaskSnapshot>> {
    state
        .tasks
        .get(&key)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Task {}", key)))
}

/// POST /api/tasks/:key/cancel
///
/// Requests cancellation; the task stops at its next stage boundary.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<TaskSnapshot>> {
    let snapshot = state.tasks.cancel(&key).await?;
    tracing::info!(task_key = %key, "Task cancellation requested");
    Ok(Json(snapshot))
}

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/:key", get(get_task))
        .route("/api/tasks/:key/cancel", post(cancel_task))
}
