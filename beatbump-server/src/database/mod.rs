//! Persistence layer: connection pool setup and repositories for group/song
//! tasks and settings.

pub mod models;
pub mod repositories;

pub use repositories::{
    GroupTaskRepository, SettingsRepository, SongTaskRepository, SqliteGroupTaskRepository,
    SqliteSettingsRepository, SqliteSongTaskRepository,
};

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};

use crate::error::Result;

pub type DbPool = Pool<Sqlite>;

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_CACHE_SIZE_KB: i32 = -64000;
const DEFAULT_WAL_AUTOCHECKPOINT_PAGES: i32 = 1000;
const DEFAULT_JOURNAL_SIZE_LIMIT_BYTES: i64 = 64 * 1024 * 1024;

/// Initialize the database connection pool with WAL mode and performance
/// optimizations, and run migrations.
///
/// `db_path` is a directory (from `BEATBUMP_DB_PATH`); the database file
/// `beatbump.db` is created inside it if missing.
pub async fn init_pool(db_path: &str) -> Result<DbPool> {
    let dir = std::path::PathBuf::from(db_path);
    crate::utils::fs::ensure_dir_all_sync(&dir)?;
    let db_file = dir.join("beatbump.db");
    let database_url = format!("sqlite://{}", db_file.display());

    let connect_options = SqliteConnectOptions::from_str(&database_url)
        .map_err(|e| crate::error::Error::Configuration(format!("invalid database url: {e}")))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(DEFAULT_POOL_SIZE)
        .acquire_timeout(Duration::from_secs(30))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!(
                    "PRAGMA wal_autocheckpoint = {DEFAULT_WAL_AUTOCHECKPOINT_PAGES}"
                ))
                .execute(&mut *conn)
                .await?;

                sqlx::query(&format!(
                    "PRAGMA journal_size_limit = {DEFAULT_JOURNAL_SIZE_LIMIT_BYTES}"
                ))
                .execute(&mut *conn)
                .await?;

                sqlx::query(&format!("PRAGMA cache_size = {DEFAULT_CACHE_SIZE_KB}"))
                    .execute(&mut *conn)
                    .await?;

                sqlx::query("PRAGMA mmap_size = 268435456")
                    .execute(&mut *conn)
                    .await?;

                sqlx::query("PRAGMA temp_store = MEMORY")
                    .execute(&mut *conn)
                    .await?;

                Ok(())
            })
        })
        .connect_with(connect_options)
        .await
        .map_err(crate::error::Error::DatabaseSqlx)?;

    tracing::info!(path = %db_file.display(), max_connections = DEFAULT_POOL_SIZE, "database pool initialized");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| crate::error::Error::Database(format!("migration failed: {e}")))?;

    Ok(pool)
}

/// Reset any group left in `processing` back to `pending` at startup.
///
/// A group can only be mid-flight because the previous process died; there
/// is no in-progress state that survives a restart, so this is the recovery
/// step described in spec §4.7.
pub async fn reset_stuck_groups(pool: &DbPool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE group_tasks SET status = 'pending', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE status = 'processing'",
    )
    .execute(pool)
    .await
    .map_err(crate::error::Error::DatabaseSqlx)?;

    let reset = result.rows_affected();
    if reset > 0 {
        tracing::warn!(count = reset, "reset stuck processing groups to pending on startup");
    }
    Ok(reset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_pool_creates_db_file_and_runs_migrations() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = init_pool(tmp.path().to_str().unwrap()).await.unwrap();

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(result.0, "wal");

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&pool)
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n, )| n.as_str()).collect();
        assert!(names.contains(&"group_tasks"));
        assert!(names.contains(&"song_tasks"));
        assert!(names.contains(&"settings"));
    }

    #[tokio::test]
    async fn reset_stuck_groups_reverts_processing_to_pending() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = init_pool(tmp.path().to_str().unwrap()).await.unwrap();

        sqlx::query(
            "INSERT INTO group_tasks (type, reference_id, status) VALUES ('playlist_download', 'pl1', 'processing')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let reset = reset_stuck_groups(&pool).await.unwrap();
        assert_eq!(reset, 1);

        let status: (String,) = sqlx::query_as("SELECT status FROM group_tasks WHERE reference_id = 'pl1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status.0, "pending");
    }
}
