//! Stream route: serves a completed track's file with HTTP range support
//! (spec §6 `GET /api/v1/stream/:taskId/:videoId`).

use std::path::PathBuf;

use axum::Router;
use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::services::ServeFile;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{task_id}/{video_id}", get(stream_track))
}

async fn stream_track(
    State(state): State<AppState>,
    Path((task_id, video_id)): Path<(i64, String)>,
    req: Request,
) -> ApiResult<Response> {
    let song = state
        .song_repo
        .get(task_id, &video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("track '{video_id}' not found in group {task_id}")))?;

    let relative = song
        .file_path
        .ok_or_else(|| ApiError::not_found("track has not finished downloading"))?;

    let download_root = state.settings_repo.get_or("download_path", ".").await?;
    let path = PathBuf::from(download_root).join(relative);

    if !path.exists() {
        return Err(ApiError::not_found("track file is missing on disk"));
    }

    match ServeFile::new(path).try_call(req).await {
        Ok(response) => Ok(response.into_response()),
        Err(e) => Err(ApiError::internal(format!("failed to serve file: {e}"))),
    }
}
