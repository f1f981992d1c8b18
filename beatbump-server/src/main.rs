//! beatbump-server - music archival job pipeline
//!
//! Queues playlist, song-mix, and ongoing-listening downloads, resolves
//! stream URLs through a companion service, transcodes and tags the result,
//! and serves the library back over HTTP.

use std::sync::Arc;

use beatbump_server::api::server::{ApiServer, ApiServerConfig, AppState};
use beatbump_server::companion::{CompanionClient, CompanionConfig};
use beatbump_server::database::{
    self, SqliteGroupTaskRepository, SqliteSettingsRepository, SqliteSongTaskRepository,
};
use beatbump_server::database::{GroupTaskRepository, SettingsRepository, SongTaskRepository};
use beatbump_server::enrichment::Enricher;
use beatbump_server::pipeline::AcquisitionPipeline;
use beatbump_server::populator::GroupPopulator;
use beatbump_server::scheduler::Scheduler;
use beatbump_server::session::SessionDetector;
use beatbump_server::transcoder::Transcoder;
use beatbump_server::utils::http_client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_dir = std::env::var("BEATBUMP_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let (logging_config, _guard) =
        beatbump_server::logging::init_logging(&log_dir).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    beatbump_server::panic_hook::install(&log_dir);

    info!("starting beatbump-server v{}", env!("CARGO_PKG_VERSION"));

    let db_path = std::env::var("BEATBUMP_DB_PATH").unwrap_or_else(|_| ".".to_string());
    let pool = database::init_pool(&db_path).await?;

    let reset = database::reset_stuck_groups(&pool).await?;
    if reset > 0 {
        info!(count = reset, "recovered groups stuck in processing from a previous run");
    }

    let group_repo: Arc<dyn GroupTaskRepository> = Arc::new(SqliteGroupTaskRepository::new(pool.clone()));
    let song_repo: Arc<dyn SongTaskRepository> = Arc::new(SqliteSongTaskRepository::new(pool.clone()));
    let settings_repo: Arc<dyn SettingsRepository> = Arc::new(SqliteSettingsRepository::new(pool.clone()));

    let http_client = http_client::build_client();
    let companion_config = CompanionConfig::from_env_or_default();
    let companion = Arc::new(CompanionClient::new(http_client.clone(), companion_config));
    let enricher = Arc::new(Enricher::new(http_client.clone()));
    let transcoder = Arc::new(Transcoder::new());

    if !transcoder.is_available().await {
        tracing::warn!("ffmpeg not found on PATH; completed tracks will be kept in their original container");
    }

    let pipeline = Arc::new(AcquisitionPipeline::new(
        http_client.clone(),
        companion.clone(),
        group_repo.clone(),
        song_repo.clone(),
        settings_repo.clone(),
        transcoder,
        enricher,
    ));
    let populator = Arc::new(GroupPopulator::new(companion.clone(), group_repo.clone(), song_repo.clone()));
    let session_detector = Arc::new(SessionDetector::new(
        companion.clone(),
        group_repo.clone(),
        song_repo.clone(),
        settings_repo.clone(),
    ));

    let cancel = CancellationToken::new();

    let scheduler = Arc::new(Scheduler::new(group_repo.clone(), song_repo.clone(), populator, pipeline.clone()));
    let scheduler_handle = scheduler.spawn(cancel.clone());

    logging_config.start_retention_cleanup(cancel.clone());

    let state = AppState::new(group_repo, song_repo, settings_repo, companion, session_detector, pipeline);
    let api_config = ApiServerConfig::from_env_or_default();
    let server = ApiServer::new(api_config, state);
    let server_cancel = server.cancel_token();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!(error = %e, "API server exited with error");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
        _ = wait_for_sigterm() => {
            info!("received SIGTERM, shutting down");
        }
    }

    cancel.cancel();
    server_cancel.cancel();

    let _ = scheduler_handle.await;
    let _ = server_handle.await;

    info!("beatbump-server shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
