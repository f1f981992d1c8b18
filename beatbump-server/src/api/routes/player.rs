//! `player.json` route (spec §6, §4.8): resolves a player response through
//! the companion service and feeds the Session Detector in the background.

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::get;
use tracing::warn;

use crate::api::error::ApiResult;
use crate::api::models::PlayerQuery;
use crate::api::server::AppState;
use crate::companion::models::PlayerResponse;

pub fn router() -> Router<AppState> {
    Router::new().route("/player.json", get(get_player))
}

async fn get_player(
    State(state): State<AppState>,
    Query(query): Query<PlayerQuery>,
) -> ApiResult<Json<PlayerResponse>> {
    let player = state.companion.fetch_player(&query.video_id, query.playlist_id.as_deref()).await?;

    let detector = state.session_detector.clone();
    let video_id = query.video_id.clone();
    let playlist_id = query.playlist_id.clone();
    let player_for_session = player.clone();
    tokio::spawn(async move {
        if let Err(e) = detector.observe(&video_id, playlist_id.as_deref(), &player_for_session).await {
            warn!(video_id = %video_id, error = %e, "session detector failed to observe playback event");
        }
    });

    Ok(Json(player))
}
