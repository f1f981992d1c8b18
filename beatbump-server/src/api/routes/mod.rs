//! API route modules, nested under `/api/v1` (spec §6).

pub mod downloads;
pub mod health;
pub mod player;
pub mod settings;
pub mod stream;

use axum::Router;

use crate::api::server::AppState;

/// Builds the full application router, wired to `state`.
pub fn create_router(state: AppState) -> Router {
    Router::new().nest("/api/v1", v1_router()).with_state(state)
}

fn v1_router() -> Router<AppState> {
    Router::new()
        .merge(downloads::router())
        .merge(settings::router())
        .merge(player::router())
        .merge(health::router())
        .nest("/stream", stream::router())
}
