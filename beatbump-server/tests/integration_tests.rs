//! End-to-end HTTP surface tests: drives the real router against a
//! temporary SQLite database and temporary download directory.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use beatbump_server::api::routes::create_router;
use beatbump_server::api::server::AppState;
use beatbump_server::companion::{CompanionClient, CompanionConfig};
use beatbump_server::database::{
    self, GroupTaskRepository, SettingsRepository, SongTaskRepository, SqliteGroupTaskRepository,
    SqliteSettingsRepository, SqliteSongTaskRepository,
};
use beatbump_server::enrichment::Enricher;
use beatbump_server::pipeline::AcquisitionPipeline;
use beatbump_server::session::SessionDetector;
use beatbump_server::transcoder::Transcoder;
use tempfile::TempDir;

/// Everything a test needs kept alive: the app state plus the temp
/// directories backing its database and download folder.
struct Harness {
    state: AppState,
    download_dir: TempDir,
    db_dir: TempDir,
}

async fn harness() -> Harness {
    let db_dir = tempfile::tempdir().unwrap();
    let pool = database::init_pool(db_dir.path().to_str().unwrap()).await.unwrap();

    let group_repo: Arc<dyn GroupTaskRepository> = Arc::new(SqliteGroupTaskRepository::new(pool.clone()));
    let song_repo: Arc<dyn SongTaskRepository> = Arc::new(SqliteSongTaskRepository::new(pool.clone()));
    let settings_repo: Arc<dyn SettingsRepository> = Arc::new(SqliteSettingsRepository::new(pool.clone()));

    let download_dir = tempfile::tempdir().unwrap();
    settings_repo.set("download_path", download_dir.path().to_str().unwrap()).await.unwrap();

    let http_client = reqwest::Client::new();
    let companion_config = CompanionConfig { base_url: String::new(), secret_key: String::new() };
    let companion = Arc::new(CompanionClient::new(http_client.clone(), companion_config));
    let enricher = Arc::new(Enricher::new(http_client.clone()));
    let transcoder = Arc::new(Transcoder::new());

    let pipeline = Arc::new(AcquisitionPipeline::new(
        http_client.clone(),
        companion.clone(),
        group_repo.clone(),
        song_repo.clone(),
        settings_repo.clone(),
        transcoder,
        enricher,
    ));
    let session_detector = Arc::new(SessionDetector::new(
        companion.clone(),
        group_repo.clone(),
        song_repo.clone(),
        settings_repo.clone(),
    ));

    let state = AppState::new(group_repo, song_repo, settings_repo, companion, session_detector, pipeline);
    Harness { state, download_dir, db_dir }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn playlist_download_queues_then_rejects_duplicate() {
    let h = harness().await;
    let router = create_router(h.state.clone());

    let response = router
        .clone()
        .oneshot(get("/api/v1/download/playlist?playlistId=PL1&playlistName=Foo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "queued");

    let response = router
        .clone()
        .oneshot(get("/api/v1/download/playlist?playlistId=PL1&playlistName=Foo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["status"], "already_queued");

    let response = router.oneshot(get("/api/v1/downloads")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let groups = body_json(response).await;
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["playlist_name"], "Foo");
    assert_eq!(groups[0]["type"], "playlist_download");
}

#[tokio::test]
async fn playlist_download_rejects_missing_id() {
    let h = harness().await;
    let router = create_router(h.state.clone());

    let response = router.oneshot(get("/api/v1/download/playlist?playlistId=&playlistName=Foo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn song_mix_download_clamps_limit_and_derives_reference_id() {
    let h = harness().await;
    let router = create_router(h.state.clone());

    let response = router
        .clone()
        .oneshot(get("/api/v1/download/song?videoId=V1&title=T&limit=600"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(get("/api/v1/downloads")).await.unwrap();
    let groups = body_json(response).await;
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["reference_id"], "songmix:V1");
    assert_eq!(groups[0]["max_tracks"], 500);
    assert_eq!(groups[0]["type"], "song_mix_download");
}

#[tokio::test]
async fn downloads_list_is_empty_array_not_null() {
    let h = harness().await;
    let router = create_router(h.state.clone());

    let response = router.oneshot(get("/api/v1/downloads")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body.is_array());
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn retry_resets_failed_children_and_group_status() {
    let h = harness().await;

    let group = h
        .state
        .group_repo
        .create(
            beatbump_server::database::models::GroupTaskType::PlaylistDownload,
            "PL2",
            "Bar",
            beatbump_server::database::models::TaskSource::User,
            0,
        )
        .await
        .unwrap();
    h.state
        .song_repo
        .add(group.id, &beatbump_server::database::models::NewSong {
            video_id: "V1".into(),
            title: "Song".into(),
            artist: "Artist".into(),
            album: String::new(),
            thumbnail_url: String::new(),
        })
        .await
        .unwrap();
    h.state
        .song_repo
        .update_status(group.id, "V1", beatbump_server::database::models::SongTaskStatus::Failed)
        .await
        .unwrap();
    h.state
        .group_repo
        .update_status(group.id, beatbump_server::database::models::GroupTaskStatus::Failed)
        .await
        .unwrap();

    let router = create_router(h.state.clone());
    let response = router.oneshot(post(&format!("/api/v1/downloads/{}/retry", group.id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let song = h.state.song_repo.get(group.id, "V1").await.unwrap().unwrap();
    assert_eq!(song.status, beatbump_server::database::models::SongTaskStatus::NotStarted);
    let refreshed = h.state.group_repo.get(group.id).await.unwrap();
    assert_eq!(refreshed.status, beatbump_server::database::models::GroupTaskStatus::Pending);
}

#[tokio::test]
async fn pause_then_resume_round_trips_group_status() {
    let h = harness().await;
    let group = h
        .state
        .group_repo
        .create(
            beatbump_server::database::models::GroupTaskType::PlaylistDownload,
            "PL3",
            "Baz",
            beatbump_server::database::models::TaskSource::User,
            0,
        )
        .await
        .unwrap();

    let router = create_router(h.state.clone());

    let response = router.clone().oneshot(post(&format!("/api/v1/downloads/{}/pause", group.id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        h.state.group_repo.get(group.id).await.unwrap().status,
        beatbump_server::database::models::GroupTaskStatus::Paused
    );

    let response = router.oneshot(post(&format!("/api/v1/downloads/{}/resume", group.id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        h.state.group_repo.get(group.id).await.unwrap().status,
        beatbump_server::database::models::GroupTaskStatus::Pending
    );
}

#[tokio::test]
async fn deleting_a_group_removes_its_download_folder() {
    let h = harness().await;
    let group = h
        .state
        .group_repo
        .create(
            beatbump_server::database::models::GroupTaskType::PlaylistDownload,
            "PL4",
            "My Playlist",
            beatbump_server::database::models::TaskSource::User,
            0,
        )
        .await
        .unwrap();

    let folder = h.download_dir.path().join(beatbump_server::utils::filename::sanitize_filename("My Playlist"));
    tokio::fs::create_dir_all(&folder).await.unwrap();
    tokio::fs::write(folder.join("playlist.m3u8"), b"#EXTM3U\n").await.unwrap();
    assert!(folder.exists());

    let router = create_router(h.state.clone());
    let response = router.oneshot(delete(&format!("/api/v1/downloads/{}", group.id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(!folder.exists());
    assert!(h.state.group_repo.get(group.id).await.is_err());
}

#[tokio::test]
async fn settings_round_trip_and_validate_download_path() {
    let h = harness().await;
    let router = create_router(h.state.clone());

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/settings")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"downloadPath":"/nonexistent/does/not/exist"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let valid_path = h.download_dir.path().to_str().unwrap().to_string();
    let body = serde_json::json!({ "downloadPath": valid_path }).to_string();
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/settings")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(get("/api/v1/settings")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["downloadPath"], valid_path);
}

#[tokio::test]
async fn health_reports_ok_status_and_version() {
    let h = harness().await;
    let router = create_router(h.state.clone());

    let response = router.oneshot(get("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn restart_recovery_resets_processing_groups_to_pending() {
    let h = harness().await;
    let group = h
        .state
        .group_repo
        .create(
            beatbump_server::database::models::GroupTaskType::PlaylistDownload,
            "PL5",
            "Qux",
            beatbump_server::database::models::TaskSource::User,
            0,
        )
        .await
        .unwrap();
    h.state
        .group_repo
        .update_status(group.id, beatbump_server::database::models::GroupTaskStatus::Processing)
        .await
        .unwrap();

    let pool = database::init_pool(h.db_dir.path().to_str().unwrap()).await.unwrap();
    let reset = database::reset_stuck_groups(&pool).await.unwrap();
    assert_eq!(reset, 1);

    assert_eq!(
        h.state.group_repo.get(group.id).await.unwrap().status,
        beatbump_server::database::models::GroupTaskStatus::Pending
    );
}
