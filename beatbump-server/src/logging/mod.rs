//! Logging setup: env-filtered console + daily rolling file output.
//!
//! There is no logging HTTP endpoint or persisted filter in this service —
//! the filter directive is fixed at process startup from `RUST_LOG` (or the
//! default below) and never reloaded, unlike systems that expose a live
//! log-level API.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::Result;
use crate::utils::fs;

/// Default log filter directive, applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "beatbump_server=info,sqlx=warn";

/// Log retention period in days.
const LOG_RETENTION_DAYS: i64 = 7;

const LOG_FILE_PREFIX: &str = "beatbump-server.log";

/// Timer that formats timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Handle kept alive for the process lifetime; owns the log directory for
/// the retention-cleanup background task.
pub struct LoggingConfig {
    log_dir: PathBuf,
}

impl LoggingConfig {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Spawn the daily retention-cleanup task; stops when `cancel_token` fires.
    pub fn start_retention_cleanup(self: &Arc<Self>, cancel_token: CancellationToken) {
        let log_dir = self.log_dir.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("log retention cleanup task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(24 * 60 * 60)) => {
                        if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS).await {
                            warn!(error = %e, "failed to clean up old logs");
                        }
                    }
                }
            }
        });
    }
}

async fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<()> {
    let cutoff_ts = (Utc::now() - chrono::Duration::days(retention_days)).timestamp();
    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(date_str) = name.strip_prefix(&format!("{LOG_FILE_PREFIX}.")) else {
            continue;
        };
        let Ok(file_date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            continue;
        };
        let file_ts = file_date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        if file_ts < cutoff_ts {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "failed to delete old log file"),
            }
        }
    }

    if deleted > 0 {
        info!(count = deleted, "cleaned up old log files");
    }
    Ok(())
}

/// Initialize the global tracing subscriber. Returns the `LoggingConfig`
/// (for the retention task) and a `WorkerGuard` that must be held for the
/// process lifetime to flush the non-blocking file writer.
pub fn init_logging(log_dir: &str) -> Result<(Arc<LoggingConfig>, WorkerGuard)> {
    let log_path = PathBuf::from(log_dir);
    fs::ensure_dir_all_sync(&log_path)?;

    let file_appender = tracing_appender::rolling::daily(&log_path, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| crate::error::Error::Other(format!("failed to init tracing subscriber: {e}")))?;

    Ok((Arc::new(LoggingConfig { log_dir: log_path }), guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_app_and_sqlx() {
        assert!(DEFAULT_LOG_FILTER.contains("beatbump_server=info"));
        assert!(DEFAULT_LOG_FILTER.contains("sqlx=warn"));
    }
}
