//! Session Detector: maps free-standing playback events to a rolling
//! "session" group task (spec §4.8).

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::companion::CompanionClient;
use crate::companion::models::PlayerResponse;
use crate::database::models::{GroupTaskType, NewSong, TaskSource};
use crate::database::{GroupTaskRepository, SettingsRepository, SongTaskRepository};
use crate::error::Result;

const SESSION_TIMEOUT_SECS: i64 = 30 * 60;

/// Radio-mix playlist ID prefixes that must never be treated as an explicit
/// playlist play (they describe an auto-generated mix, not a user playlist).
const RADIO_MIX_PREFIXES: &[&str] = &["RDEM", "RDAMVM", "RDAT"];

pub struct SessionDetector {
    companion: Arc<CompanionClient>,
    group_repo: Arc<dyn GroupTaskRepository>,
    song_repo: Arc<dyn SongTaskRepository>,
    settings_repo: Arc<dyn SettingsRepository>,
}

impl SessionDetector {
    pub fn new(
        companion: Arc<CompanionClient>,
        group_repo: Arc<dyn GroupTaskRepository>,
        song_repo: Arc<dyn SongTaskRepository>,
        settings_repo: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self { companion, group_repo, song_repo, settings_repo }
    }

    /// Called whenever the HTTP surface serves a `player.json` request. A
    /// no-op unless `ongoing_listening_enabled = "true"`.
    pub async fn observe(&self, video_id: &str, playlist_id: Option<&str>, player: &PlayerResponse) -> Result<()> {
        let enabled = self.settings_repo.get_or("ongoing_listening_enabled", "false").await?;
        if enabled != "true" {
            return Ok(());
        }

        let group_id = match real_playlist_id(playlist_id) {
            Some(id) => self.playlist_group(id).await?,
            None => self.session_group().await?,
        };

        let Some(details) = &player.video_details else { return Ok(()) };
        let song = NewSong {
            video_id: video_id.to_string(),
            title: details.title.clone(),
            artist: details.author.clone(),
            album: String::new(),
            thumbnail_url: details.best_thumbnail().unwrap_or_default().to_string(),
        };
        self.song_repo.add(group_id, &song).await
    }

    async fn playlist_group(&self, playlist_id: &str) -> Result<i64> {
        let reference_id = format!("ongoing:playlist:{playlist_id}");
        if let Some(existing) = self.group_repo.get_by_reference_id(&reference_id).await? {
            return Ok(existing.id);
        }

        let playlist_name = self
            .companion
            .fetch_playlist_name(playlist_id)
            .await
            .unwrap_or_else(|e| {
                warn!(playlist_id, error = %e, "failed to resolve playlist name, using fallback");
                format!("Playlist {playlist_id}")
            });

        let group = self
            .group_repo
            .create(GroupTaskType::OngoingDownload, &reference_id, &playlist_name, TaskSource::System, 0)
            .await?;
        Ok(group.id)
    }

    async fn session_group(&self) -> Result<i64> {
        if let Some(active) = self.group_repo.get_active_session_group(SESSION_TIMEOUT_SECS).await? {
            return Ok(active.id);
        }

        let now = Utc::now();
        let reference_id = format!("ongoing:songs:{}", now.timestamp());
        let playlist_name = format!("Listening Session {}", now.format("%Y-%m-%d %H:%M"));

        let group = self
            .group_repo
            .create(GroupTaskType::OngoingDownload, &reference_id, &playlist_name, TaskSource::System, 0)
            .await?;
        Ok(group.id)
    }
}

/// Returns the playlist ID if it names a real user playlist rather than an
/// absent/placeholder value or an auto-generated radio mix.
fn real_playlist_id(playlist_id: Option<&str>) -> Option<&str> {
    let id = playlist_id?;
    if id.is_empty() || id == "undefined" {
        return None;
    }
    if RADIO_MIX_PREFIXES.iter().any(|prefix| id.starts_with(prefix)) {
        return None;
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_playlist_id_rejects_placeholders_and_radio_mixes() {
        assert_eq!(real_playlist_id(None), None);
        assert_eq!(real_playlist_id(Some("")), None);
        assert_eq!(real_playlist_id(Some("undefined")), None);
        assert_eq!(real_playlist_id(Some("RDEMabc123")), None);
        assert_eq!(real_playlist_id(Some("RDAMVMxyz")), None);
        assert_eq!(real_playlist_id(Some("RDATfoo")), None);
    }

    #[test]
    fn real_playlist_id_accepts_genuine_playlist() {
        assert_eq!(real_playlist_id(Some("PLabc123")), Some("PLabc123"));
    }
}
