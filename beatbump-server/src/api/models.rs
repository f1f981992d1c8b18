//! API request and response DTOs (spec §6).

use serde::{Deserialize, Serialize};

/// `GET /api/v1/download/playlist`
#[derive(Debug, Deserialize)]
pub struct DownloadPlaylistQuery {
    #[serde(rename = "playlistId")]
    pub playlist_id: String,
    #[serde(rename = "playlistName", default)]
    pub playlist_name: String,
}

/// `GET /api/v1/download/song`
#[derive(Debug, Deserialize)]
pub struct DownloadSongQuery {
    #[serde(rename = "videoId")]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// `GET /api/v1/player.json`
#[derive(Debug, Deserialize)]
pub struct PlayerQuery {
    #[serde(rename = "videoId")]
    pub video_id: String,
    #[serde(rename = "playlistId", default)]
    pub playlist_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self { status: status.into() }
    }
}

/// `GET /api/v1/settings`
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    #[serde(rename = "downloadPath")]
    pub download_path: String,
    #[serde(rename = "ongoingListeningEnabled")]
    pub ongoing_listening_enabled: String,
}

/// `POST /api/v1/settings`. Either field may be omitted to leave that setting
/// unchanged, matching the upstream handler's "empty string = no-op" rule.
#[derive(Debug, Deserialize, Default)]
pub struct SettingsRequest {
    #[serde(rename = "downloadPath", default)]
    pub download_path: String,
    #[serde(rename = "ongoingListeningEnabled", default)]
    pub ongoing_listening_enabled: String,
}

/// Liveness/readiness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_playlist_query_accepts_camel_case_params() {
        let q: DownloadPlaylistQuery =
            serde_json::from_str(r#"{"playlistId":"PL1","playlistName":"Foo"}"#).unwrap();
        assert_eq!(q.playlist_id, "PL1");
        assert_eq!(q.playlist_name, "Foo");
    }

    #[test]
    fn download_song_query_limit_is_optional() {
        let q: DownloadSongQuery = serde_json::from_str(r#"{"videoId":"V1","title":"T"}"#).unwrap();
        assert_eq!(q.limit, None);
    }
}
