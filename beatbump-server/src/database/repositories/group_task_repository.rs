use sqlx::{Row, SqlitePool};

use crate::database::models::{GroupTask, GroupTaskRow, GroupTaskStatus, GroupTaskType, TaskSource};
use crate::error::{Error, Result};

/// Persistence operations for group tasks (spec §4.1).
///
/// Defined as a trait, matching the repository-per-trait shape the rest of
/// this crate's SQLite layer uses, so call sites can depend on the
/// abstraction rather than a concrete pool.
#[async_trait::async_trait]
pub trait GroupTaskRepository: Send + Sync {
    async fn create(
        &self,
        r#type: GroupTaskType,
        reference_id: &str,
        playlist_name: &str,
        source: TaskSource,
        max_tracks: i64,
    ) -> Result<GroupTask>;

    async fn get(&self, id: i64) -> Result<GroupTask>;

    async fn get_by_reference_id(&self, reference_id: &str) -> Result<Option<GroupTask>>;

    /// The oldest unstarted user-initiated group, if any.
    async fn get_pending_user_group(&self) -> Result<Option<GroupTask>>;

    /// The most recently touched ongoing-listening group, if it was updated
    /// within `timeout_secs` of now.
    async fn get_active_session_group(&self, timeout_secs: i64) -> Result<Option<GroupTask>>;

    async fn list_with_counts(&self) -> Result<Vec<GroupTask>>;

    async fn update_status(&self, id: i64, status: GroupTaskStatus) -> Result<()>;

    async fn touch(&self, id: i64) -> Result<()>;

    /// Reset failed songs to `not_started` and the group back to `pending`.
    async fn retry(&self, id: i64) -> Result<()>;

    /// `true` once every child song is `completed` (and there is at least one).
    async fn is_complete(&self, id: i64) -> Result<bool>;

    async fn reset_stuck(&self) -> Result<u64>;

    /// Deletes a group and, via `ON DELETE CASCADE`, all of its children.
    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqliteGroupTaskRepository {
    pool: SqlitePool,
}

impl SqliteGroupTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_task(row: GroupTaskRow) -> Result<GroupTask> {
    GroupTask::from_row(row)
}

#[async_trait::async_trait]
impl GroupTaskRepository for SqliteGroupTaskRepository {
    async fn create(
        &self,
        r#type: GroupTaskType,
        reference_id: &str,
        playlist_name: &str,
        source: TaskSource,
        max_tracks: i64,
    ) -> Result<GroupTask> {
        let id = sqlx::query(
            "INSERT INTO group_tasks (type, reference_id, status, playlist_name, source, max_tracks) \
             VALUES (?, ?, 'pending', ?, ?, ?)",
        )
        .bind(r#type.to_string())
        .bind(reference_id)
        .bind(playlist_name)
        .bind(source.to_string())
        .bind(max_tracks)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::AlreadyQueued(reference_id.to_string())
            }
            _ => Error::DatabaseSqlx(e),
        })?
        .last_insert_rowid();

        self.get(id).await
    }

    async fn get(&self, id: i64) -> Result<GroupTask> {
        let row: GroupTaskRow = sqlx::query_as("SELECT * FROM group_tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::DatabaseSqlx)?
            .ok_or_else(|| Error::not_found("group task", id.to_string()))?;

        row_to_task(row)
    }

    async fn get_by_reference_id(&self, reference_id: &str) -> Result<Option<GroupTask>> {
        let row: Option<GroupTaskRow> =
            sqlx::query_as("SELECT * FROM group_tasks WHERE reference_id = ?")
                .bind(reference_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::DatabaseSqlx)?;

        row.map(row_to_task).transpose()
    }

    async fn get_pending_user_group(&self) -> Result<Option<GroupTask>> {
        let row: Option<GroupTaskRow> = sqlx::query_as(
            "SELECT * FROM group_tasks WHERE status = 'pending' AND source = 'user' \
             ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;

        row.map(row_to_task).transpose()
    }

    async fn get_active_session_group(&self, timeout_secs: i64) -> Result<Option<GroupTask>> {
        let row: Option<GroupTaskRow> = sqlx::query_as(
            "SELECT * FROM group_tasks WHERE type = 'ongoing_download' AND reference_id LIKE 'ongoing:songs:%' \
             ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;

        let Some(row) = row else { return Ok(None) };
        let task = row_to_task(row)?;
        let age = chrono::Utc::now() - task.updated_at;
        if age.num_seconds() > timeout_secs {
            return Ok(None);
        }
        Ok(Some(task))
    }

    async fn list_with_counts(&self) -> Result<Vec<GroupTask>> {
        let rows: Vec<GroupTaskRow> =
            sqlx::query_as("SELECT * FROM group_tasks ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(Error::DatabaseSqlx)?;

        let counts = sqlx::query(
            "SELECT group_task_id, \
                    COUNT(*) AS total, \
                    SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END) AS completed, \
                    SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END) AS failed \
             FROM song_tasks GROUP BY group_task_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let mut task = row_to_task(row)?;
            if let Some(c) = counts.iter().find(|c| c.get::<i64, _>("group_task_id") == task.id) {
                task.total_tracks = c.get("total");
                task.completed_tracks = c.get("completed");
                task.failed_tracks = c.get("failed");
            }
            tasks.push(task);
        }
        Ok(tasks)
    }

    async fn update_status(&self, id: i64, status: GroupTaskStatus) -> Result<()> {
        sqlx::query(
            "UPDATE group_tasks SET status = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
        )
        .bind(status.to_string())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;
        Ok(())
    }

    async fn touch(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE group_tasks SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::DatabaseSqlx)?;
        Ok(())
    }

    async fn retry(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::DatabaseSqlx)?;

        sqlx::query(
            "UPDATE song_tasks SET status = 'not_started', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
             WHERE group_task_id = ? AND status = 'failed'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::DatabaseSqlx)?;

        sqlx::query(
            "UPDATE group_tasks SET status = 'pending', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::DatabaseSqlx)?;

        tx.commit().await.map_err(Error::DatabaseSqlx)?;
        Ok(())
    }

    async fn is_complete(&self, id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END) AS completed \
             FROM song_tasks WHERE group_task_id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;

        let total: i64 = row.get("total");
        let completed: Option<i64> = row.get("completed");
        Ok(total > 0 && Some(total) == completed)
    }

    async fn reset_stuck(&self) -> Result<u64> {
        crate::database::reset_stuck_groups(&self.pool).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM group_tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::DatabaseSqlx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqliteGroupTaskRepository {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteGroupTaskRepository::new(pool)
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let repo = setup().await;
        let created = repo
            .create(
                GroupTaskType::PlaylistDownload,
                "PL123",
                "My Playlist",
                TaskSource::User,
                0,
            )
            .await
            .unwrap();

        let fetched = repo.get(created.id).await.unwrap();
        assert_eq!(fetched.reference_id, "PL123");
        assert_eq!(fetched.status, GroupTaskStatus::Pending);
    }

    #[tokio::test]
    async fn get_by_reference_id_enforces_uniqueness() {
        let repo = setup().await;
        repo.create(
            GroupTaskType::PlaylistDownload,
            "PL1",
            "",
            TaskSource::User,
            0,
        )
        .await
        .unwrap();

        let dup = repo
            .create(GroupTaskType::PlaylistDownload, "PL1", "", TaskSource::User, 0)
            .await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn get_pending_user_group_skips_system_source() {
        let repo = setup().await;
        repo.create(
            GroupTaskType::OngoingDownload,
            "ongoing:songs:abc",
            "",
            TaskSource::System,
            0,
        )
        .await
        .unwrap();
        let user_task = repo
            .create(GroupTaskType::PlaylistDownload, "PL9", "", TaskSource::User, 0)
            .await
            .unwrap();

        let pending = repo.get_pending_user_group().await.unwrap().unwrap();
        assert_eq!(pending.id, user_task.id);
    }

    #[tokio::test]
    async fn retry_resets_failed_songs_and_group_status() {
        let repo = setup().await;
        let task = repo
            .create(GroupTaskType::PlaylistDownload, "PL2", "", TaskSource::User, 0)
            .await
            .unwrap();
        repo.update_status(task.id, GroupTaskStatus::Failed).await.unwrap();

        sqlx::query(
            "INSERT INTO song_tasks (group_task_id, video_id, status) VALUES (?, 'vid1', 'failed')",
        )
        .bind(task.id)
        .execute(&repo.pool)
        .await
        .unwrap();

        repo.retry(task.id).await.unwrap();

        let refreshed = repo.get(task.id).await.unwrap();
        assert_eq!(refreshed.status, GroupTaskStatus::Pending);

        let song_status: (String,) =
            sqlx::query_as("SELECT status FROM song_tasks WHERE group_task_id = ? AND video_id = 'vid1'")
                .bind(task.id)
                .fetch_one(&repo.pool)
                .await
                .unwrap();
        assert_eq!(song_status.0, "not_started");
    }

    #[tokio::test]
    async fn delete_cascades_to_song_tasks() {
        let repo = setup().await;
        let task = repo
            .create(GroupTaskType::PlaylistDownload, "PL3", "", TaskSource::User, 0)
            .await
            .unwrap();
        sqlx::query("INSERT INTO song_tasks (group_task_id, video_id, status) VALUES (?, 'vid1', 'completed')")
            .bind(task.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        repo.delete(task.id).await.unwrap();

        assert!(repo.get(task.id).await.is_err());
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM song_tasks WHERE group_task_id = ?")
            .bind(task.id)
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }
}
