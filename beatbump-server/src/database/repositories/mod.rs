mod group_task_repository;
mod settings_repository;
mod song_task_repository;

pub use group_task_repository::{GroupTaskRepository, SqliteGroupTaskRepository};
pub use settings_repository::{SettingsRepository, SqliteSettingsRepository};
pub use song_task_repository::{SongTaskRepository, SqliteSongTaskRepository};
