use sqlx::SqlitePool;

use crate::database::models::{NewSong, SongTask, SongTaskRow, SongTaskStatus};
use crate::error::{Error, Result};

/// Persistence operations for song tasks (spec §4.1).
#[async_trait::async_trait]
pub trait SongTaskRepository: Send + Sync {
    /// Insert a song, ignoring the call if `(group_task_id, video_id)` already
    /// exists (matches the populator's idempotent-expansion requirement).
    async fn add(&self, group_task_id: i64, song: &NewSong) -> Result<()>;

    async fn list_for_group(&self, group_task_id: i64) -> Result<Vec<SongTask>>;

    async fn get(&self, group_task_id: i64, video_id: &str) -> Result<Option<SongTask>>;

    /// Unstarted songs across all non-paused groups, user-sourced groups
    /// ordered ahead of system-sourced ones, oldest-first within each tier.
    async fn claim_pending(&self, limit: i64) -> Result<Vec<SongTask>>;

    async fn update_status(&self, group_task_id: i64, video_id: &str, status: SongTaskStatus) -> Result<()>;

    async fn mark_completed(&self, group_task_id: i64, video_id: &str, file_path: &str) -> Result<()>;

    async fn delete(&self, group_task_id: i64, video_id: &str) -> Result<()>;
}

pub struct SqliteSongTaskRepository {
    pool: SqlitePool,
}

impl SqliteSongTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SongTaskRepository for SqliteSongTaskRepository {
    async fn add(&self, group_task_id: i64, song: &NewSong) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO song_tasks (group_task_id, video_id, status, title, artist, album, thumbnail_url) \
             VALUES (?, ?, 'not_started', ?, ?, ?, ?)",
        )
        .bind(group_task_id)
        .bind(&song.video_id)
        .bind(&song.title)
        .bind(&song.artist)
        .bind(&song.album)
        .bind(&song.thumbnail_url)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;

        sqlx::query("UPDATE group_tasks SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?")
            .bind(group_task_id)
            .execute(&self.pool)
            .await
            .map_err(Error::DatabaseSqlx)?;

        Ok(())
    }

    async fn list_for_group(&self, group_task_id: i64) -> Result<Vec<SongTask>> {
        let rows: Vec<SongTaskRow> = sqlx::query_as(
            "SELECT * FROM song_tasks WHERE group_task_id = ? ORDER BY created_at ASC",
        )
        .bind(group_task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;

        rows.into_iter().map(SongTask::from_row).collect()
    }

    async fn get(&self, group_task_id: i64, video_id: &str) -> Result<Option<SongTask>> {
        let row: Option<SongTaskRow> = sqlx::query_as(
            "SELECT * FROM song_tasks WHERE group_task_id = ? AND video_id = ?",
        )
        .bind(group_task_id)
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;

        row.map(SongTask::from_row).transpose()
    }

    async fn claim_pending(&self, limit: i64) -> Result<Vec<SongTask>> {
        let rows: Vec<SongTaskRow> = sqlx::query_as(
            "SELECT song_tasks.* FROM song_tasks \
             JOIN group_tasks ON song_tasks.group_task_id = group_tasks.id \
             WHERE song_tasks.status = 'not_started' AND group_tasks.status != 'paused' \
             ORDER BY CASE WHEN group_tasks.source = 'user' THEN 0 ELSE 1 END, song_tasks.created_at ASC \
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;

        rows.into_iter().map(SongTask::from_row).collect()
    }

    async fn update_status(&self, group_task_id: i64, video_id: &str, status: SongTaskStatus) -> Result<()> {
        sqlx::query(
            "UPDATE song_tasks SET status = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
             WHERE group_task_id = ? AND video_id = ?",
        )
        .bind(status.to_string())
        .bind(group_task_id)
        .bind(video_id)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;
        Ok(())
    }

    async fn mark_completed(&self, group_task_id: i64, video_id: &str, file_path: &str) -> Result<()> {
        sqlx::query(
            "UPDATE song_tasks SET status = 'completed', file_path = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
             WHERE group_task_id = ? AND video_id = ?",
        )
        .bind(file_path)
        .bind(group_task_id)
        .bind(video_id)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;
        Ok(())
    }

    async fn delete(&self, group_task_id: i64, video_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM song_tasks WHERE group_task_id = ? AND video_id = ?")
            .bind(group_task_id)
            .bind(video_id)
            .execute(&self.pool)
            .await
            .map_err(Error::DatabaseSqlx)?;
        Ok(())
    }
}
