//! Settings API
//!
//! `GET /api/settings` reports which secrets are configured (values are never
//! returned). `PUT /api/settings/:key` stores a secret in the database, makes
//! it live for the running clients and syncs it to the TOML file.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{self, SecretKind};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct SettingStatus {
    pub key: &'static str,
    pub configured: bool,
}

async fn status(state: &AppState, kind: SecretKind) -> SettingStatus {
    SettingStatus {
        key: kind.setting_key(),
        configured: state.settings.secrets.get(kind).is_set().await,
    }
}

/// GET /api/settings
pub async fn list_settings(State(state): State<AppState>) -> Json<Vec<SettingStatus>> {
    let mut statuses = Vec::with_capacity(SecretKind::ALL.len());
    for kind in SecretKind::ALL {
        statuses.push(status(&state, kind).await);
    }
    Json(statuses)
}

/// PUT /api/settings/:key
///
/// 400 for a blank value, 404 for an unknown key. A failed TOML write only
/// logs; the database is authoritative.
pub async fn set_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<SetSettingRequest>,
) -> ApiResult<Json<SettingStatus>> {
    let kind = SecretKind::from_setting_key(&key)
        .ok_or_else(|| ApiError::NotFound(format!("Setting {}", key)))?;

    let value = request.value.trim().to_string();
    config::update_secret(&state.db, &state.settings.secrets, kind, value.clone()).await?;

    if let Some(path) = &state.settings.config_path {
        if let Err(e) = config::sync_secret_to_toml(kind, &value, path) {
            warn!("Could not sync {} to TOML: {}", key, e);
        }
    }

    Ok(Json(status(&state, kind).await))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/api/settings", get(list_settings))
        .route("/api/settings/:key", put(set_setting))
}
