//! Best-effort-optional response shapes for the companion service's opaque
//! JSON payloads (spec §6, §9 "Dynamic JSON shapes"). Every field that the
//! upstream platform might omit is optional; traversal never assumes
//! presence.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerResponse {
    #[serde(rename = "playabilityStatus")]
    pub playability_status: PlayabilityStatus,
    #[serde(rename = "streamingData")]
    pub streaming_data: Option<StreamingData>,
    #[serde(rename = "videoDetails")]
    pub video_details: Option<VideoDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayabilityStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingData {
    #[serde(rename = "adaptiveFormats", default)]
    pub adaptive_formats: Vec<AdaptiveFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveFormat {
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    #[serde(default)]
    pub bitrate: u64,
    pub url: Option<String>,
    #[serde(rename = "contentLength", default, deserialize_with = "content_length_from_str")]
    pub content_length: u64,
}

fn content_length_from_str<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(u64),
    }
    match Option::<StrOrNum>::deserialize(deserializer)? {
        Some(StrOrNum::Str(s)) => Ok(s.parse().unwrap_or(0)),
        Some(StrOrNum::Num(n)) => Ok(n),
        None => Ok(0),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDetails {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub thumbnail: Option<ThumbnailContainer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailContainer {
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: u32,
}

impl VideoDetails {
    /// The last (generally highest-resolution) thumbnail, if any.
    pub fn best_thumbnail(&self) -> Option<&str> {
        self.thumbnail
            .as_ref()?
            .thumbnails
            .iter()
            .max_by_key(|t| t.width)
            .map(|t| t.url.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistResponse {
    #[serde(default)]
    pub tracks: Vec<PlaylistTrack>,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistTrack {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "artistInfo", default)]
    pub artist_info: ArtistInfo,
    pub album: Option<AlbumRef>,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

impl PlaylistTrack {
    pub fn primary_artist(&self) -> String {
        self.artist_info
            .artist
            .first()
            .map(|a| a.text.clone())
            .unwrap_or_default()
    }

    pub fn album_name(&self) -> String {
        self.album.as_ref().map(|a| a.text.clone()).unwrap_or_default()
    }

    pub fn best_thumbnail(&self) -> Option<&str> {
        self.thumbnails.iter().max_by_key(|t| t.width).map(|t| t.url.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistInfo {
    #[serde(default)]
    pub artist: Vec<ArtistRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistRef {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumRef {
    pub text: String,
}

/// One entry of a song-mix/radio continuation (the "queue"/"next" response).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "artistInfo", default)]
    pub artist_info: ArtistInfo,
    pub album: Option<AlbumRef>,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SongMixResponse {
    #[serde(default)]
    pub items: Vec<QueueItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_accepts_string_or_number() {
        let from_str: AdaptiveFormat =
            serde_json::from_str(r#"{"mimeType":"audio/mp4","bitrate":128000,"url":"u","contentLength":"12345"}"#)
                .unwrap();
        assert_eq!(from_str.content_length, 12345);

        let from_num: AdaptiveFormat =
            serde_json::from_str(r#"{"mimeType":"audio/mp4","bitrate":128000,"url":"u","contentLength":12345}"#)
                .unwrap();
        assert_eq!(from_num.content_length, 12345);

        let missing: AdaptiveFormat =
            serde_json::from_str(r#"{"mimeType":"audio/mp4","bitrate":128000,"url":"u"}"#).unwrap();
        assert_eq!(missing.content_length, 0);
    }

    #[test]
    fn best_thumbnail_picks_widest() {
        let details = VideoDetails {
            title: "T".into(),
            author: "A".into(),
            thumbnail: Some(ThumbnailContainer {
                thumbnails: vec![
                    Thumbnail { url: "small".into(), width: 120 },
                    Thumbnail { url: "large".into(), width: 480 },
                ],
            }),
        };
        assert_eq!(details.best_thumbnail(), Some("large"));
    }
}
