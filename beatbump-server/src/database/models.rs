//! Row types and small domain enums for the persistence layer.
//!
//! Enums are stored as their lowercase `snake_case` string form in SQLite
//! (there is no native enum type) and convert at the repository boundary via
//! `FromStr`/`Display`, matching the `strum`-free string-mapping style the
//! rest of this crate uses for small closed sets.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupTaskType {
    PlaylistDownload,
    SongMixDownload,
    OngoingDownload,
}

impl fmt::Display for GroupTaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PlaylistDownload => "playlist_download",
            Self::SongMixDownload => "song_mix_download",
            Self::OngoingDownload => "ongoing_download",
        };
        f.write_str(s)
    }
}

impl FromStr for GroupTaskType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "playlist_download" => Ok(Self::PlaylistDownload),
            "song_mix_download" => Ok(Self::SongMixDownload),
            "ongoing_download" => Ok(Self::OngoingDownload),
            other => Err(crate::error::Error::Database(format!(
                "unknown group task type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupTaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Paused,
}

impl fmt::Display for GroupTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Paused => "paused",
        };
        f.write_str(s)
    }
}

impl FromStr for GroupTaskStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "paused" => Ok(Self::Paused),
            other => Err(crate::error::Error::Database(format!(
                "unknown group task status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    User,
    System,
}

impl fmt::Display for TaskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::System => "system",
        })
    }
}

impl FromStr for TaskSource {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "system" => Ok(Self::System),
            other => Err(crate::error::Error::Database(format!(
                "unknown task source: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongTaskStatus {
    NotStarted,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for SongTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "not_started",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

impl FromStr for SongTaskStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(crate::error::Error::Database(format!(
                "unknown song task status: {other}"
            ))),
        }
    }
}

/// A row from `group_tasks`, as stored (string columns, not yet parsed into enums).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupTaskRow {
    pub id: i64,
    pub r#type: String,
    pub reference_id: String,
    pub status: String,
    pub playlist_name: String,
    pub source: String,
    pub max_tracks: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A group task with its string columns parsed, and (if loaded via
/// `list_groups_with_counts`) child-count aggregates filled in.
#[derive(Debug, Clone, Serialize)]
pub struct GroupTask {
    pub id: i64,
    pub r#type: GroupTaskType,
    pub reference_id: String,
    pub status: GroupTaskStatus,
    pub playlist_name: String,
    pub source: TaskSource,
    pub max_tracks: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_tracks: i64,
    pub completed_tracks: i64,
    pub failed_tracks: i64,
}

impl GroupTask {
    pub fn from_row(row: GroupTaskRow) -> crate::error::Result<Self> {
        Ok(Self {
            id: row.id,
            r#type: row.r#type.parse()?,
            reference_id: row.reference_id,
            status: row.status.parse()?,
            playlist_name: row.playlist_name,
            source: row.source.parse()?,
            max_tracks: row.max_tracks,
            created_at: row.created_at,
            updated_at: row.updated_at,
            total_tracks: 0,
            completed_tracks: 0,
            failed_tracks: 0,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SongTaskRow {
    pub group_task_id: i64,
    pub video_id: String,
    pub status: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub thumbnail_url: String,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SongTask {
    pub group_task_id: i64,
    pub video_id: String,
    pub status: SongTaskStatus,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub thumbnail_url: String,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SongTask {
    pub fn from_row(row: SongTaskRow) -> crate::error::Result<Self> {
        Ok(Self {
            group_task_id: row.group_task_id,
            video_id: row.video_id,
            status: row.status.parse()?,
            title: row.title,
            artist: row.artist,
            album: row.album,
            thumbnail_url: row.thumbnail_url,
            file_path: row.file_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A new song to insert; mirrors the Group Populator / Session Detector's
/// per-track inputs (spec §4.6, §4.8).
#[derive(Debug, Clone, Default)]
pub struct NewSong {
    pub video_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub thumbnail_url: String,
}
