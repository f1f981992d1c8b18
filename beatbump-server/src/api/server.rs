//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::Request;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::companion::CompanionClient;
use crate::database::{GroupTaskRepository, SettingsRepository, SongTaskRepository};
use crate::error::Result;
use crate::pipeline::AcquisitionPipeline;
use crate::session::SessionDetector;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 8080, enable_cors: true }
    }
}

impl ApiServerConfig {
    /// Loads from `API_BIND_ADDRESS` / `API_PORT`, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(bind_address) = std::env::var("API_BIND_ADDRESS")
            && !bind_address.trim().is_empty()
        {
            config.bind_address = bind_address;
        }

        if let Ok(port) = std::env::var("API_PORT")
            && let Ok(parsed) = port.parse::<u16>()
        {
            config.port = parsed;
        }

        config
    }
}

/// Shared application state threaded into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub start_time: Instant,
    pub group_repo: Arc<dyn GroupTaskRepository>,
    pub song_repo: Arc<dyn SongTaskRepository>,
    pub settings_repo: Arc<dyn SettingsRepository>,
    pub companion: Arc<CompanionClient>,
    pub session_detector: Arc<SessionDetector>,
    pub pipeline: Arc<AcquisitionPipeline>,
}

impl AppState {
    pub fn new(
        group_repo: Arc<dyn GroupTaskRepository>,
        song_repo: Arc<dyn SongTaskRepository>,
        settings_repo: Arc<dyn SettingsRepository>,
        companion: Arc<CompanionClient>,
        session_detector: Arc<SessionDetector>,
        pipeline: Arc<AcquisitionPipeline>,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            group_repo,
            song_repo,
            settings_repo,
            companion,
            session_detector,
            pipeline,
        }
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self { config, state, cancel_token: CancellationToken::new() }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if self.config.enable_cors {
            let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
            router = router.layer(cors);
        }

        router = router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if req.uri().path().starts_with("/api/v1/health") {
                        Span::none()
                    } else {
                        let mut make_span =
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                        use tower_http::trace::MakeSpan;
                        make_span.make_span(req)
                    }
                })
                .on_failure(
                    |class: tower_http::classify::ServerErrorsFailureClass,
                     latency: Duration,
                     span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let mut on_failure =
                            tower_http::trace::DefaultOnFailure::new().level(tracing::Level::ERROR);
                        use tower_http::trace::OnFailure;
                        on_failure.on_failure(class, latency, span);
                    },
                ),
        );
        router
    }

    /// Starts the server; resolves once a graceful shutdown completes.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| crate::error::Error::Configuration(format!("invalid bind address: {e}")))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await.map_err(crate::error::Error::Io)?;

        tracing::info!("API server listening on http://{addr}");

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down");
            })
            .await
            .map_err(crate::error::Error::Io)?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
