//! Group Populator: expands a group task into its child song tasks from
//! upstream playlist data (spec §4.6).

use std::sync::Arc;

use crate::companion::CompanionClient;
use crate::database::models::{GroupTask, GroupTaskType, NewSong};
use crate::database::{GroupTaskRepository, SongTaskRepository};
use crate::error::{Error, Result};

pub const MAX_SONGMIX_TRACKS: i64 = 500;

pub struct GroupPopulator {
    companion: Arc<CompanionClient>,
    group_repo: Arc<dyn GroupTaskRepository>,
    song_repo: Arc<dyn SongTaskRepository>,
}

impl GroupPopulator {
    pub fn new(
        companion: Arc<CompanionClient>,
        group_repo: Arc<dyn GroupTaskRepository>,
        song_repo: Arc<dyn SongTaskRepository>,
    ) -> Self {
        Self { companion, group_repo, song_repo }
    }

    /// Dispatches by group type. `OngoingDownload` groups are never
    /// populated eagerly here; the Session Detector inserts their children
    /// online, so this is a no-op for that type.
    pub async fn populate(&self, group: &GroupTask) -> Result<()> {
        match group.r#type {
            GroupTaskType::PlaylistDownload => self.populate_playlist(group).await,
            GroupTaskType::SongMixDownload => self.populate_song_mix(group).await,
            GroupTaskType::OngoingDownload => Ok(()),
        }
    }

    async fn populate_playlist(&self, group: &GroupTask) -> Result<()> {
        let existing = self.song_repo.list_for_group(group.id).await?;
        if !existing.is_empty() {
            return Ok(());
        }

        let playlist = self.companion.fetch_playlist(&group.reference_id).await?;
        for track in playlist.tracks {
            let Some(video_id) = track.video_id.filter(|id| !id.is_empty()) else {
                continue;
            };
            let song = NewSong {
                video_id,
                title: track.title.clone(),
                artist: track.primary_artist(),
                album: track.album_name(),
                thumbnail_url: track.best_thumbnail().unwrap_or_default().to_string(),
            };
            self.song_repo.add(group.id, &song).await?;
        }
        Ok(())
    }

    async fn populate_song_mix(&self, group: &GroupTask) -> Result<()> {
        let existing = self.song_repo.list_for_group(group.id).await?;
        if !existing.is_empty() {
            return Ok(());
        }

        let seed_video_id = group
            .reference_id
            .strip_prefix("songmix:")
            .ok_or_else(|| Error::Database(format!("malformed song-mix reference id: {}", group.reference_id)))?;

        self.song_repo
            .add(
                group.id,
                &NewSong {
                    video_id: seed_video_id.to_string(),
                    title: group.playlist_name.clone(),
                    ..Default::default()
                },
            )
            .await?;

        let limit = group.max_tracks.clamp(0, MAX_SONGMIX_TRACKS);
        if limit == 0 {
            return Ok(());
        }

        let mix = self.companion.fetch_song_mix(seed_video_id).await?;
        for item in mix.items.into_iter().take(limit as usize) {
            let Some(video_id) = item.video_id.filter(|id| !id.is_empty()) else {
                continue;
            };
            let song = NewSong {
                video_id,
                title: item.title,
                artist: item.artist_info.artist.first().map(|a| a.text.clone()).unwrap_or_default(),
                album: item.album.map(|a| a.text).unwrap_or_default(),
                thumbnail_url: item
                    .thumbnails
                    .iter()
                    .max_by_key(|t| t.width)
                    .map(|t| t.url.clone())
                    .unwrap_or_default(),
            };
            self.song_repo.add(group.id, &song).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(-5, 0)]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(50, 50)]
    #[case(500, 500)]
    #[case(501, 500)]
    #[case(600, 500)]
    #[case(i64::MAX, 500)]
    fn songmix_track_limit_clamps_to_range(#[case] requested: i64, #[case] expected: i64) {
        assert_eq!(requested.clamp(0, MAX_SONGMIX_TRACKS), expected);
    }
}
