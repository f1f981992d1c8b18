//! Download lifecycle routes (spec §6): create, list, inspect, pause/resume/
//! retry, and delete group and song tasks.

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{DownloadPlaylistQuery, DownloadSongQuery, StatusResponse};
use crate::api::server::AppState;
use crate::database::models::{GroupTask, GroupTaskStatus, GroupTaskType, SongTask, TaskSource};
use crate::populator::MAX_SONGMIX_TRACKS;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/download/playlist", get(create_playlist_download))
        .route("/download/song", get(create_song_mix_download))
        .route("/downloads", get(list_downloads))
        .route("/downloads/{task_id}/tracks", get(list_tracks))
        .route("/downloads/{task_id}/pause", post(pause_download))
        .route("/downloads/{task_id}/resume", post(resume_download))
        .route("/downloads/{task_id}/retry", post(retry_download))
        .route("/downloads/{task_id}", delete(delete_download))
        .route("/downloads/{task_id}/{video_id}", delete(delete_track))
}

async fn create_playlist_download(
    State(state): State<AppState>,
    Query(query): Query<DownloadPlaylistQuery>,
) -> ApiResult<Json<StatusResponse>> {
    if query.playlist_id.trim().is_empty() {
        return Err(ApiError::bad_request("playlistId is required"));
    }

    let name = if query.playlist_name.trim().is_empty() {
        query.playlist_id.clone()
    } else {
        query.playlist_name
    };

    state
        .group_repo
        .create(GroupTaskType::PlaylistDownload, &query.playlist_id, &name, TaskSource::User, 0)
        .await?;

    Ok(Json(StatusResponse::new("queued")))
}

async fn create_song_mix_download(
    State(state): State<AppState>,
    Query(query): Query<DownloadSongQuery>,
) -> ApiResult<Json<StatusResponse>> {
    if query.video_id.trim().is_empty() {
        return Err(ApiError::bad_request("videoId is required"));
    }

    let max_tracks = query.limit.unwrap_or(0).clamp(0, MAX_SONGMIX_TRACKS);
    let reference_id = format!("songmix:{}", query.video_id);
    let name = if query.title.trim().is_empty() { query.video_id.clone() } else { query.title };

    state
        .group_repo
        .create(GroupTaskType::SongMixDownload, &reference_id, &name, TaskSource::User, max_tracks)
        .await?;

    Ok(Json(StatusResponse::new("queued")))
}

async fn list_downloads(State(state): State<AppState>) -> ApiResult<Json<Vec<GroupTask>>> {
    let groups = state.group_repo.list_with_counts().await?;
    Ok(Json(groups))
}

async fn list_tracks(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<Vec<SongTask>>> {
    // Confirms the group exists so an unknown id reports 404 rather than `[]`.
    state.group_repo.get(task_id).await?;
    let songs = state.song_repo.list_for_group(task_id).await?;
    Ok(Json(songs))
}

async fn pause_download(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<StatusResponse>> {
    state.group_repo.get(task_id).await?;
    state.group_repo.update_status(task_id, GroupTaskStatus::Paused).await?;
    Ok(Json(StatusResponse::new("paused")))
}

async fn resume_download(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<StatusResponse>> {
    state.group_repo.get(task_id).await?;
    state.group_repo.update_status(task_id, GroupTaskStatus::Pending).await?;
    Ok(Json(StatusResponse::new("pending")))
}

async fn retry_download(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<StatusResponse>> {
    state.group_repo.get(task_id).await?;
    state.group_repo.retry(task_id).await?;
    Ok(Json(StatusResponse::new("pending")))
}

async fn delete_download(State(state): State<AppState>, Path(task_id): Path<i64>) -> ApiResult<Json<StatusResponse>> {
    let group = state.group_repo.get(task_id).await?;
    let download_root = state.settings_repo.get_or("download_path", ".").await?;
    let folder = state.pipeline.resolve_folder(&download_root, &group);

    state.group_repo.delete(task_id).await?;
    crate::utils::fs::remove_dir_all_best_effort(&folder).await;

    Ok(Json(StatusResponse::new("deleted")))
}

async fn delete_track(
    State(state): State<AppState>,
    Path((task_id, video_id)): Path<(i64, String)>,
) -> ApiResult<Json<StatusResponse>> {
    let song = state
        .song_repo
        .get(task_id, &video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("track '{video_id}' not found in group {task_id}")))?;

    if let Some(relative) = &song.file_path {
        let download_root = state.settings_repo.get_or("download_path", ".").await?;
        let path = std::path::PathBuf::from(download_root).join(relative);
        crate::utils::fs::remove_file_best_effort(&path).await;
    }

    state.song_repo.delete(task_id, &video_id).await?;
    Ok(Json(StatusResponse::new("deleted")))
}
