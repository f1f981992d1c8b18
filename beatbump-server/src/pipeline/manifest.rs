//! Playlist manifest generation emitted once a group reaches `Completed`
//! (spec §4.5 step 7).

use std::path::Path;

use crate::database::models::SongTask;
use crate::error::{Error, Result};

/// Writes `playlist.m3u8`: `#EXTM3U` followed by one `#EXTINF:-1,<Artist> -
/// <Title>` / basename pair per completed child, in the order given.
pub async fn write_m3u8(folder: &Path, songs: &[SongTask]) -> Result<()> {
    let mut body = String::from("#EXTM3U\n");
    for song in songs {
        let Some(file_path) = &song.file_path else { continue };
        let basename = Path::new(file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_path);
        body.push_str(&format!("#EXTINF:-1,{} - {}\n{basename}\n", song.artist, song.title));
    }

    tokio::fs::write(folder.join("playlist.m3u8"), body)
        .await
        .map_err(Error::Io)
}

/// Writes the literal XML `album.nfo` companion file.
pub async fn write_nfo(folder: &Path, album_title: &str) -> Result<()> {
    let content = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\" ?>\n\
<album>\n  <title>{album_title}</title>\n  <artist>Various Artists</artist>\n  <albumartist>Various Artists</albumartist>\n  <compilation>true</compilation>\n</album>"
    );
    tokio::fs::write(folder.join("album.nfo"), content)
        .await
        .map_err(Error::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::SongTaskStatus;
    use chrono::Utc;

    fn song(artist: &str, title: &str, file_path: &str) -> SongTask {
        SongTask {
            group_task_id: 1,
            video_id: "v".into(),
            status: SongTaskStatus::Completed,
            title: title.into(),
            artist: artist.into(),
            album: String::new(),
            thumbnail_url: String::new(),
            file_path: Some(file_path.into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn write_m3u8_includes_one_entry_per_completed_song() {
        let tmp = tempfile::tempdir().unwrap();
        let songs = vec![
            song("Artist A", "Title A", "Folder/Artist A - Title A.mp3"),
            song("Artist B", "Title B", "Folder/Artist B - Title B.mp3"),
        ];
        write_m3u8(tmp.path(), &songs).await.unwrap();

        let body = tokio::fs::read_to_string(tmp.path().join("playlist.m3u8")).await.unwrap();
        assert!(body.starts_with("#EXTM3U\n"));
        assert!(body.contains("#EXTINF:-1,Artist A - Title A\nArtist A - Title A.mp3\n"));
        assert!(body.contains("#EXTINF:-1,Artist B - Title B\nArtist B - Title B.mp3\n"));
    }

    #[tokio::test]
    async fn write_nfo_contains_compilation_fields() {
        let tmp = tempfile::tempdir().unwrap();
        write_nfo(tmp.path(), "My Playlist").await.unwrap();

        let body = tokio::fs::read_to_string(tmp.path().join("album.nfo")).await.unwrap();
        assert!(body.contains("<albumartist>Various Artists</albumartist>"));
        assert!(body.contains("<compilation>true</compilation>"));
        assert!(body.contains("<title>My Playlist</title>"));
    }
}
