//! Companion client: thin bearer-token HTTP client to the trusted upstream
//! intermediary that talks to the media platform (spec §6).

pub mod models;

use models::{PlaylistResponse, PlayerResponse, SongMixResponse};
use serde_json::json;

use crate::error::{Error, Result};

/// Process-level config read once at startup (`COMPANION_URL`,
/// `COMPANION_SECRET_KEY`); threaded explicitly rather than read from
/// ambient globals (spec §9).
#[derive(Debug, Clone)]
pub struct CompanionConfig {
    pub base_url: String,
    pub secret_key: String,
}

impl CompanionConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("COMPANION_URL")
            .map_err(|_| Error::config("COMPANION_URL is not set"))?;
        let secret_key = std::env::var("COMPANION_SECRET_KEY")
            .map_err(|_| Error::config("COMPANION_SECRET_KEY is not set"))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    /// Like [`Self::from_env`], but never fails startup: a missing
    /// `COMPANION_URL`/`COMPANION_SECRET_KEY` yields an empty config instead,
    /// deferring the failure to the first player/playlist call (spec §6).
    pub fn from_env_or_default() -> Self {
        Self::from_env().unwrap_or_else(|_| {
            tracing::warn!(
                "COMPANION_URL / COMPANION_SECRET_KEY not set; player and playlist lookups will fail until configured"
            );
            Self { base_url: String::new(), secret_key: String::new() }
        })
    }
}

pub struct CompanionClient {
    client: reqwest::Client,
    config: CompanionConfig,
}

impl CompanionClient {
    pub fn new(client: reqwest::Client, config: CompanionConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/companion/youtubei/v1/{path}", self.config.base_url)
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        if self.config.base_url.is_empty() {
            return Err(Error::Configuration("COMPANION_URL is not set".to_string()));
        }

        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "companion returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("invalid companion response: {e}")))
    }

    /// Resolves stream URLs and playability for a single video.
    pub async fn fetch_player(&self, video_id: &str, playlist_id: Option<&str>) -> Result<PlayerResponse> {
        let body = json!({ "videoId": video_id, "playlistId": playlist_id.unwrap_or("") });
        let raw = self.post_json("player", body).await?;
        serde_json::from_value(raw).map_err(|e| Error::UpstreamUnavailable(format!("unexpected player shape: {e}")))
    }

    /// Fetches every track of a playlist in one call (spec §4.6 PlaylistDownload).
    pub async fn fetch_playlist(&self, playlist_id: &str) -> Result<PlaylistResponse> {
        let body = json!({ "playlistId": playlist_id });
        let raw = self.post_json("playlist", body).await?;
        serde_json::from_value(raw)
            .map_err(|e| Error::UpstreamUnavailable(format!("unexpected playlist shape: {e}")))
    }

    /// Fetches the "queue/radio" continuation seeded from `video_id`, used to
    /// expand a SongMixDownload group beyond its seed track (spec §4.6).
    pub async fn fetch_song_mix(&self, video_id: &str) -> Result<SongMixResponse> {
        let body = json!({ "videoId": video_id, "isAudioOnly": true });
        let raw = self.post_json("next", body).await?;
        serde_json::from_value(raw)
            .map_err(|e| Error::UpstreamUnavailable(format!("unexpected song-mix shape: {e}")))
    }

    /// Fetches just the playlist's display name, used to label a freshly
    /// discovered ongoing-listening playlist session (spec §4.8).
    pub async fn fetch_playlist_name(&self, playlist_id: &str) -> Result<String> {
        let playlist = self.fetch_playlist(playlist_id).await?;
        if playlist.title.is_empty() {
            Ok(format!("Playlist {playlist_id}"))
        } else {
            Ok(playlist.title)
        }
    }
}
