//! Channel registration and management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use tubedigest_common::events::TubeDigestEvent;
use uuid::Uuid;

use crate::db;
use crate::models::{Channel, PollFrequency};
use crate::services::ResolutionTier;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub channel_id: String,
    pub tier: ResolutionTier,
    /// False when the channel was picked without matching evidence
    pub confident: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateChannelRequest {
    pub url: String,
    pub frequency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateChannelResponse {
    #[serde(flatten)]
    pub channel: Channel,
    pub confident: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChannelRequest {
    pub frequency: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub channel_guid: Uuid,
    pub new_videos: usize,
}

#[derive(Debug, Serialize)]
pub struct BulkSubmitResponse {
    pub channel_guid: Uuid,
    pub queued: usize,
    pub task_keys: Vec<String>,
}

fn parse_frequency(value: Option<&str>) -> ApiResult<Option<PollFrequency>> {
    value
        .map(|v| v.parse::<PollFrequency>().map_err(ApiError::BadRequest))
        .transpose()
}

pub(crate) async fn load_channel(state: &AppState, guid: Uuid) -> ApiResult<Channel> {
    db::channels::get_channel(&state.db, guid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Channel {}", guid)))
}

/// POST /api/channels/resolve
///
/// Previews resolution without saving anything.
pub async fn resolve_channel(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Json<ResolveResponse>> {
    let resolution = state.resolver().resolve(&request.url).await?;
    Ok(Json(ResolveResponse {
        confident: resolution.is_confident(),
        channel_id: resolution.channel_id,
        tier: resolution.tier,
    }))
}

/// POST /api/channels
///
/// Resolves the URL, fetches channel details and registers the channel.
/// Registering an already known channel is a 409.
pub async fn create_channel(
    State(state): State<AppState>,
    Json(request): Json<CreateChannelRequest>,
) -> ApiResult<(StatusCode, Json<CreateChannelResponse>)> {
    let frequency = parse_frequency(request.frequency.as_deref())?.unwrap_or_default();
    let resolution = state.resolver().resolve(&request.url).await?;

    if db::channels::get_channel_by_external_id(&state.db, &resolution.channel_id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "Channel {} is already registered",
            resolution.channel_id
        )));
    }

    let details = state.catalog.channel_details(&resolution.channel_id).await?;
    let channel = Channel::from_details(details, &request.url, frequency, resolution.tier);
    db::channels::insert_channel(&state.db, &channel).await?;

    info!(
        channel_id = %channel.external_id,
        name = %channel.name,
        tier = %channel.resolution_tier,
        "Channel registered"
    );

    state.event_bus.emit_lossy(TubeDigestEvent::ChannelRegistered {
        channel_guid: channel.guid,
        external_id: channel.external_id.clone(),
        name: channel.name.clone(),
        timestamp: Utc::now(),
    });

    Ok((
        StatusCode::CREATED,
        Json(CreateChannelResponse {
            confident: resolution.is_confident(),
            channel,
        }),
    ))
}

/// GET /api/channels
pub async fn list_channels(State(state): State<AppState>) -> ApiResult<Json<Vec<Channel>>> {
    Ok(Json(db::channels::list_channels(&state.db).await?))
}

/// GET /api/channels/:id
pub async fn get_channel(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
) -> ApiResult<Json<Channel>> {
    Ok(Json(load_channel(&state, guid).await?))
}

/// PATCH /api/channels/:id
pub async fn update_channel(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
    Json(request): Json<UpdateChannelRequest>,
) -> ApiResult<Json<Channel>> {
    let frequency = parse_frequency(request.frequency.as_deref())?;
    db::channels::update_channel(&state.db, guid, frequency, request.active)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Channel {}", guid)))
}

/// DELETE /api/channels/:id
///
/// Removes the channel with its videos and summaries.
pub async fn delete_channel(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if db::channels::delete_channel(&state.db, guid).await? {
        info!(channel_guid = %guid, "Channel deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Channel {}", guid)))
    }
}

/// POST /api/channels/:id/refresh
///
/// Polls the channel immediately, regardless of its frequency.
pub async fn refresh_channel(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
) -> ApiResult<Json<RefreshResponse>> {
    let channel = load_channel(&state, guid).await?;
    let new_videos = state.poller().poll_channel(&channel).await?;
    Ok(Json(RefreshResponse {
        channel_guid: guid,
        new_videos: new_videos.len(),
    }))
}

/// POST /api/channels/:id/summarize-all
///
/// Queues every video of the channel that has no summary yet.
pub async fn summarize_all(
    State(state): State<AppState>,
    Path(guid): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<BulkSubmitResponse>)> {
    let channel = load_channel(&state, guid).await?;
    let videos = db::videos::list_unsummarized(&state.db, channel.guid).await?;

    let (task_keys, _join) = state.pipeline.submit_bulk(channel.guid, videos).await;
    info!(channel = %channel.name, queued = task_keys.len(), "Bulk summarization queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(BulkSubmitResponse {
            channel_guid: channel.guid,
            queued: task_keys.len(),
            task_keys,
        }),
    ))
}

/// Build channel routes
pub fn channel_routes() -> Router<AppState> {
    Router::new()
        .route("/api/channels", get(list_channels).post(create_channel))
        .route("/api/channels/resolve", post(resolve_channel))
        .route(
            "/api/channels/:id",
            get(get_channel).patch(update_channel).delete(delete_channel),
        )
        .route("/api/channels/:id/refresh", post(refresh_channel))
        .route("/api/channels/:id/summarize-all", post(summarize_all))
}
