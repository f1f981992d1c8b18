//! Settings routes (spec §6): read/write `download_path` and
//! `ongoing_listening_enabled`.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{SettingsRequest, SettingsResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).post(post_settings))
}

async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<SettingsResponse>> {
    let download_path = state.settings_repo.get_or("download_path", "").await?;
    let ongoing_listening_enabled = state.settings_repo.get_or("ongoing_listening_enabled", "false").await?;
    Ok(Json(SettingsResponse { download_path, ongoing_listening_enabled }))
}

async fn post_settings(
    State(state): State<AppState>,
    Json(request): Json<SettingsRequest>,
) -> ApiResult<Json<SettingsResponse>> {
    if !request.download_path.is_empty() {
        let path = std::path::Path::new(&request.download_path);
        if !path.is_dir() {
            return Err(ApiError::bad_request(format!(
                "download_path '{}' does not exist or is not a directory",
                request.download_path
            )));
        }
        state.settings_repo.set("download_path", &request.download_path).await?;
    }

    if !request.ongoing_listening_enabled.is_empty() {
        if request.ongoing_listening_enabled == "true" {
            let download_path = state.settings_repo.get_or("download_path", "").await?;
            let path = std::path::Path::new(&download_path);
            if download_path.is_empty() || !path.is_dir() {
                return Err(ApiError::bad_request(
                    "a valid download_path must be set before enabling ongoing_listening_enabled",
                ));
            }
        }
        state
            .settings_repo
            .set("ongoing_listening_enabled", &request.ongoing_listening_enabled)
            .await?;
    }

    let download_path = state.settings_repo.get_or("download_path", "").await?;
    let ongoing_listening_enabled = state.settings_repo.get_or("ongoing_listening_enabled", "false").await?;
    Ok(Json(SettingsResponse { download_path, ongoing_listening_enabled }))
}
