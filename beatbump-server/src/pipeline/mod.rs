//! Acquisition Pipeline: per-track resolve → download → transcode → commit
//! (spec §4.5).

pub mod manifest;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::companion::CompanionClient;
use crate::database::models::{GroupTask, GroupTaskStatus, GroupTaskType, SongTask, SongTaskStatus};
use crate::database::{GroupTaskRepository, SettingsRepository, SongTaskRepository};
use crate::enrichment::Enricher;
use crate::error::{Error, Result};
use crate::fetcher;
use crate::transcoder::{TrackTags, Transcoder};
use crate::utils::filename::{sanitize_filename, track_stem};
use crate::utils::fs as fs_utils;

const OUT_OF_SPACE_THRESHOLD_BYTES: u64 = 50 * 1024 * 1024;

pub struct AcquisitionPipeline {
    http_client: reqwest::Client,
    companion: Arc<CompanionClient>,
    group_repo: Arc<dyn GroupTaskRepository>,
    song_repo: Arc<dyn SongTaskRepository>,
    settings_repo: Arc<dyn SettingsRepository>,
    transcoder: Arc<Transcoder>,
    enricher: Arc<Enricher>,
}

impl AcquisitionPipeline {
    pub fn new(
        http_client: reqwest::Client,
        companion: Arc<CompanionClient>,
        group_repo: Arc<dyn GroupTaskRepository>,
        song_repo: Arc<dyn SongTaskRepository>,
        settings_repo: Arc<dyn SettingsRepository>,
        transcoder: Arc<Transcoder>,
        enricher: Arc<Enricher>,
    ) -> Self {
        Self {
            http_client,
            companion,
            group_repo,
            song_repo,
            settings_repo,
            transcoder,
            enricher,
        }
    }

    /// Runs a single song task to completion or failure. Never propagates an
    /// error upward — the scheduler advances regardless, matching the
    /// "never abort the entire run on a single song" policy (spec §7).
    pub async fn run(&self, group: &GroupTask, song: &SongTask, cancel: CancellationToken) {
        if let Err(e) = self.run_inner(group, song, cancel).await {
            warn!(group_id = group.id, video_id = %song.video_id, error = %e, "song task failed");
            let _ = self
                .song_repo
                .update_status(group.id, &song.video_id, SongTaskStatus::Failed)
                .await;
        }
    }

    async fn run_inner(&self, group: &GroupTask, song: &SongTask, cancel: CancellationToken) -> Result<()> {
        self.song_repo
            .update_status(group.id, &song.video_id, SongTaskStatus::Processing)
            .await?;

        let download_root = self.settings_repo.get_or("download_path", ".").await?;
        let folder = self.resolve_folder(&download_root, group);
        fs_utils::ensure_dir_all(&folder).await?;

        let free = fs_utils::free_space_bytes(&folder)?;
        if free < OUT_OF_SPACE_THRESHOLD_BYTES {
            return Err(Error::OutOfSpace { needed_bytes: OUT_OF_SPACE_THRESHOLD_BYTES });
        }

        let player = self
            .companion
            .fetch_player(&song.video_id, Some(&group.reference_id))
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        if player.playability_status.status != "OK" {
            return Err(Error::NotPlayable(player.playability_status.status));
        }

        let mut best_format = None;
        for format in player
            .streaming_data
            .as_ref()
            .into_iter()
            .flat_map(|sd| sd.adaptive_formats.iter())
            .filter(|f| f.mime_type.starts_with("audio"))
        {
            match best_format {
                None => best_format = Some(format),
                Some(current) if format.bitrate > current.bitrate => best_format = Some(format),
                Some(_) => {}
            }
        }
        let best_format = best_format.ok_or(Error::NoAudioStream)?;

        let stream_url = best_format.url.clone().ok_or(Error::NoAudioStream)?;
        let content_length = best_format.content_length;

        let stem = track_stem(&song.artist, &song.title);
        let m4a_path = folder.join(format!("{stem}.m4a"));

        if let Err(e) = self.download_to(&stream_url, content_length, &m4a_path, cancel).await {
            fs_utils::remove_file_best_effort(&m4a_path).await;
            return Err(Error::DownloadFailed(e.to_string()));
        }

        let final_path = self.maybe_transcode(&folder, &stem, &m4a_path, group, song).await;

        let relative = final_path
            .strip_prefix(&download_root)
            .unwrap_or(&final_path)
            .to_string_lossy()
            .into_owned();

        self.song_repo
            .mark_completed(group.id, &song.video_id, &relative)
            .await?;

        if self.group_repo.is_complete(group.id).await? {
            self.group_repo.update_status(group.id, GroupTaskStatus::Completed).await?;
            self.emit_manifest(&folder, group).await;
        }

        Ok(())
    }

    async fn download_to(
        &self,
        url: &str,
        content_length: u64,
        dest: &Path,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut file = tokio::fs::File::create(dest).await.map_err(Error::Io)?;
        fetcher::fetch(&self.http_client, url, content_length, &mut file, cancel).await
    }

    /// Best-effort transcode to MP3 with enriched tags and cover art.
    /// Returns the path of whichever artifact should be treated as final.
    async fn maybe_transcode(
        &self,
        folder: &Path,
        stem: &str,
        m4a_path: &Path,
        _group: &GroupTask,
        song: &SongTask,
    ) -> PathBuf {
        if !self.transcoder.is_available().await {
            return m4a_path.to_path_buf();
        }

        let enriched = self.enricher.lookup(&song.artist, &song.title).await.ok();
        let tags = TrackTags {
            title: enriched.as_ref().map(|e| e.title.clone()).unwrap_or_else(|| song.title.clone()),
            artist: enriched.as_ref().map(|e| e.artist.clone()).unwrap_or_else(|| song.artist.clone()),
            album: enriched.as_ref().map(|e| e.album.clone()).unwrap_or_else(|| song.album.clone()),
            year: enriched.as_ref().and_then(|e| e.year.clone()),
            genre: enriched.as_ref().and_then(|e| e.genre.clone()),
        };

        let artwork_url = enriched
            .as_ref()
            .and_then(|e| e.artwork_url.clone())
            .or_else(|| Some(song.thumbnail_url.clone()).filter(|u| !u.is_empty()));

        let cover_path = match &artwork_url {
            Some(url) => self.download_cover(url).await,
            None => None,
        };

        let mp3_path = folder.join(format!("{stem}.mp3"));
        let result = self
            .transcoder
            .convert_to_mp3(m4a_path, &mp3_path, cover_path.as_deref(), &tags)
            .await;

        if let Some(cover_path) = &cover_path {
            fs_utils::remove_file_best_effort(cover_path).await;
        }

        match result {
            Ok(()) => {
                fs_utils::remove_file_best_effort(m4a_path).await;
                mp3_path
            }
            Err(e) => {
                warn!(error = %e, "transcode failed, keeping original container");
                m4a_path.to_path_buf()
            }
        }
    }

    async fn download_cover(&self, url: &str) -> Option<PathBuf> {
        let response = self.http_client.get(url).send().await.ok()?;
        let bytes = response.bytes().await.ok()?;
        let path = std::env::temp_dir().join(format!("beatbump-cover-{}.jpg", uuid_like()));
        tokio::fs::write(&path, &bytes).await.ok()?;
        Some(path)
    }

    async fn emit_manifest(&self, folder: &Path, group: &GroupTask) {
        let songs = match self.song_repo.list_for_group(group.id).await {
            Ok(songs) => songs,
            Err(e) => {
                warn!(error = %e, "failed to load songs for manifest generation");
                return;
            }
        };

        if let Err(e) = manifest::write_m3u8(folder, &songs).await {
            warn!(error = %e, "failed to write playlist.m3u8");
        }
        if let Err(e) = manifest::write_nfo(folder, &group.playlist_name).await {
            warn!(error = %e, "failed to write album.nfo");
        }
        info!(group_id = group.id, "group completed, manifest emitted");
    }

    /// Exposed at crate visibility so the HTTP delete handlers can recompute
    /// a group's folder without duplicating the naming convention.
    pub(crate) fn resolve_folder(&self, download_root: &str, group: &GroupTask) -> PathBuf {
        let root = Path::new(download_root);
        match group.r#type {
            GroupTaskType::PlaylistDownload => root.join(sanitize_filename(&group.playlist_name)),
            GroupTaskType::SongMixDownload => {
                let label = format!("{} mix-({} songs)", group.playlist_name, group.max_tracks);
                root.join(sanitize_filename(&label))
            }
            GroupTaskType::OngoingDownload => {
                let name = if group.playlist_name.is_empty() {
                    format!("Songs {}", group.created_at.format("%Y-%m-%d_%H-%M"))
                } else {
                    group.playlist_name.clone()
                };
                root.join("Ongoing Listening").join(sanitize_filename(&name))
            }
        }
    }
}

/// A short, non-cryptographic unique suffix for scratch cover-art filenames.
/// Temp files are process-scoped scratch space, not identifiers, so a UUID
/// dependency would be overkill here.
fn uuid_like() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    format!("{nanos:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn group(r#type: GroupTaskType, playlist_name: &str, max_tracks: i64) -> GroupTask {
        GroupTask {
            id: 1,
            r#type,
            reference_id: "ref".into(),
            status: GroupTaskStatus::Processing,
            playlist_name: playlist_name.into(),
            source: crate::database::models::TaskSource::User,
            max_tracks,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            total_tracks: 0,
            completed_tracks: 0,
            failed_tracks: 0,
        }
    }

    fn pipeline_for_folder_test() -> AcquisitionPipeline {
        AcquisitionPipeline {
            http_client: reqwest::Client::new(),
            companion: Arc::new(CompanionClient::new(
                reqwest::Client::new(),
                crate::companion::CompanionConfig { base_url: "http://x".into(), secret_key: "k".into() },
            )),
            group_repo: Arc::new(NullGroupRepo),
            song_repo: Arc::new(NullSongRepo),
            settings_repo: Arc::new(NullSettingsRepo),
            transcoder: Arc::new(Transcoder::new()),
            enricher: Arc::new(Enricher::new(reqwest::Client::new())),
        }
    }

    struct NullGroupRepo;
    #[async_trait::async_trait]
    impl GroupTaskRepository for NullGroupRepo {
        async fn create(&self, _: GroupTaskType, _: &str, _: &str, _: crate::database::models::TaskSource, _: i64) -> Result<GroupTask> { unimplemented!() }
        async fn get(&self, _: i64) -> Result<GroupTask> { unimplemented!() }
        async fn get_by_reference_id(&self, _: &str) -> Result<Option<GroupTask>> { unimplemented!() }
        async fn get_pending_user_group(&self) -> Result<Option<GroupTask>> { unimplemented!() }
        async fn get_active_session_group(&self, _: i64) -> Result<Option<GroupTask>> { unimplemented!() }
        async fn list_with_counts(&self) -> Result<Vec<GroupTask>> { unimplemented!() }
        async fn update_status(&self, _: i64, _: GroupTaskStatus) -> Result<()> { unimplemented!() }
        async fn touch(&self, _: i64) -> Result<()> { unimplemented!() }
        async fn retry(&self, _: i64) -> Result<()> { unimplemented!() }
        async fn is_complete(&self, _: i64) -> Result<bool> { unimplemented!() }
        async fn reset_stuck(&self) -> Result<u64> { unimplemented!() }
        async fn delete(&self, _: i64) -> Result<()> { unimplemented!() }
    }

    struct NullSongRepo;
    #[async_trait::async_trait]
    impl SongTaskRepository for NullSongRepo {
        async fn add(&self, _: i64, _: &crate::database::models::NewSong) -> Result<()> { unimplemented!() }
        async fn list_for_group(&self, _: i64) -> Result<Vec<SongTask>> { unimplemented!() }
        async fn get(&self, _: i64, _: &str) -> Result<Option<SongTask>> { unimplemented!() }
        async fn claim_pending(&self, _: i64) -> Result<Vec<SongTask>> { unimplemented!() }
        async fn update_status(&self, _: i64, _: &str, _: SongTaskStatus) -> Result<()> { unimplemented!() }
        async fn mark_completed(&self, _: i64, _: &str, _: &str) -> Result<()> { unimplemented!() }
        async fn delete(&self, _: i64, _: &str) -> Result<()> { unimplemented!() }
    }

    struct NullSettingsRepo;
    #[async_trait::async_trait]
    impl SettingsRepository for NullSettingsRepo {
        async fn get(&self, _: &str) -> Result<Option<String>> { unimplemented!() }
        async fn set(&self, _: &str, _: &str) -> Result<()> { unimplemented!() }
    }

    #[test]
    fn resolve_folder_playlist_uses_sanitized_name() {
        let pipeline = pipeline_for_folder_test();
        let g = group(GroupTaskType::PlaylistDownload, "My: Playlist", 0);
        let folder = pipeline.resolve_folder("/music", &g);
        assert_eq!(folder, Path::new("/music/My Playlist"));
    }

    #[test]
    fn resolve_folder_songmix_includes_track_count() {
        let pipeline = pipeline_for_folder_test();
        let g = group(GroupTaskType::SongMixDownload, "Chill", 25);
        let folder = pipeline.resolve_folder("/music", &g);
        assert_eq!(folder, Path::new("/music/Chill mix-(25 songs)"));
    }

    #[test]
    fn resolve_folder_ongoing_falls_back_to_timestamped_default() {
        let pipeline = pipeline_for_folder_test();
        let g = group(GroupTaskType::OngoingDownload, "", 0);
        let folder = pipeline.resolve_folder("/music", &g);
        assert!(folder.starts_with("/music/Ongoing Listening/Songs "));
    }
}
