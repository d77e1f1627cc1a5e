//! Admin-token gated operations: config key read/write, track deletion, and
//! the manual skip control (§6 External Interfaces).
//!
//! The token is a single shared secret configured via [`AdminConfig`], sent
//! as a bearer-style `X-Admin-Token` header — no session state, no per-user
//! accounts, matching the single-operator scope of this service.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::AppState;
use crate::config::AdminConfig;
use crate::models::ProgrammingMode;

fn check_admin_token(config: &AdminConfig, headers: &HeaderMap) -> Result<(), StatusCode> {
    let configured = config.token.as_deref().ok_or(StatusCode::FORBIDDEN)?;

    let provided = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if provided == configured {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigValue {
    pub key: String,
    pub value: Option<String>,
}

pub async fn get_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<Json<ConfigValue>, StatusCode> {
    check_admin_token(&state.config.admin, &headers)?;

    let value = state.database.get_config(&key).await.map_err(|e| {
        error!(error = %e, key, "admin: failed to read config key");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(ConfigValue { key, value }))
}

#[derive(Debug, Deserialize)]
pub struct SetConfigRequest {
    pub value: String,
}

/// §6: validated keys reject a value that would later fail to parse
/// (`programming_mode`) or fall outside the scheduler's accepted range
/// (`rotation_tracks_per_block`); other keys pass through unvalidated.
pub async fn set_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(req): Json<SetConfigRequest>,
) -> Result<StatusCode, StatusCode> {
    check_admin_token(&state.config.admin, &headers)?;

    validate_config_value(&key, &req.value)?;

    state
        .database
        .set_config(&key, &req.value)
        .await
        .map_err(|e| {
            error!(error = %e, key, "admin: failed to write config key");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(StatusCode::NO_CONTENT)
}

fn validate_config_value(key: &str, value: &str) -> Result<(), StatusCode> {
    match key {
        "programming_mode" => value
            .parse::<ProgrammingMode>()
            .map(|_| ())
            .map_err(|_| StatusCode::BAD_REQUEST),
        "rotation_tracks_per_block" => {
            let n: i64 = value.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
            if (1..=20).contains(&n) {
                Ok(())
            } else {
                Err(StatusCode::BAD_REQUEST)
            }
        }
        _ => Ok(()),
    }
}

/// Delete a track and its normalized file. The raw (pre-transcode) file, if
/// any, is left to the worker's own cleanup since a track can only be
/// deleted once it is no longer mid-pipeline in the common case.
pub async fn delete_track(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(track_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    check_admin_token(&state.config.admin, &headers)?;

    let track = state.database.get_track(&track_id).await.map_err(|e| {
        error!(error = %e, track_id, "admin: failed to look up track");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let Some(track) = track else {
        return Err(StatusCode::NOT_FOUND);
    };

    state.database.delete_track(&track_id).await.map_err(|e| {
        error!(error = %e, track_id, "admin: failed to delete track");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if let Some(path) = track.file_path {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                error!(error = %e, path, "admin: failed to unlink normalized file");
            }
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Skip the currently playing track on the live stream.
pub async fn skip(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, StatusCode> {
    check_admin_token(&state.config.admin, &headers)?;

    crate::streaming::skip(&state.database, &state.config.streaming_control)
        .await
        .map_err(|e| {
            error!(error = %e, "admin: failed to signal stream skip");
            StatusCode::BAD_GATEWAY
        })?;

    Ok(StatusCode::NO_CONTENT)
}
