use sqlx::SqlitePool;

use crate::error::{Error, Result};

/// Key-value settings store (spec §4.1): `download_path`,
/// `ongoing_listening_enabled`, and similar small config values a user can
/// change at runtime without restarting the process.
#[async_trait::async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get(key).await?.unwrap_or_else(|| default.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::DatabaseSqlx)?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(Error::DatabaseSqlx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqliteSettingsRepository {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteSettingsRepository::new(pool)
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let repo = setup().await;
        repo.set("download_path", "/music").await.unwrap();
        assert_eq!(repo.get("download_path").await.unwrap().as_deref(), Some("/music"));
    }

    #[tokio::test]
    async fn set_overwrites_existing_value() {
        let repo = setup().await;
        repo.set("ongoing_listening_enabled", "true").await.unwrap();
        repo.set("ongoing_listening_enabled", "false").await.unwrap();
        assert_eq!(
            repo.get("ongoing_listening_enabled").await.unwrap().as_deref(),
            Some("false")
        );
    }

    #[tokio::test]
    async fn get_or_falls_back_to_default() {
        let repo = setup().await;
        assert_eq!(repo.get_or("missing_key", "fallback").await.unwrap(), "fallback");
    }
}
