//! Metadata Enricher: rate-limited iTunes lookup with script-based region
//! hinting (spec §4.4).

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{Error, Result};

const ITUNES_SEARCH_URL: &str = "https://itunes.apple.com/search";
const RATE_INTERVAL: Duration = Duration::from_secs(3);

/// Canonical track metadata returned by a successful lookup.
#[derive(Debug, Clone, Default)]
pub struct EnrichedMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ITunesResponse {
    #[serde(rename = "resultCount")]
    result_count: u32,
    results: Vec<ITunesItem>,
}

#[derive(Debug, Deserialize)]
struct ITunesItem {
    #[serde(rename = "artistName")]
    artist_name: String,
    #[serde(rename = "trackName")]
    track_name: String,
    #[serde(rename = "collectionName")]
    collection_name: Option<String>,
    #[serde(rename = "artworkUrl100")]
    artwork_url_100: Option<String>,
    #[serde(rename = "primaryGenreName")]
    primary_genre_name: Option<String>,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
}

/// Single-token, 1-per-3-second bucket shared process-wide. `acquire` blocks
/// the caller (respecting cancellation via the caller's own select) until a
/// token is available rather than queueing requests internally.
struct TokenBucket {
    next_available: Mutex<Instant>,
}

impl TokenBucket {
    fn new() -> Self {
        Self { next_available: Mutex::new(Instant::now()) }
    }

    async fn acquire(&self) {
        let mut next = self.next_available.lock().await;
        let now = Instant::now();
        if *next > now {
            tokio::time::sleep(*next - now).await;
        }
        *next = Instant::now() + RATE_INTERVAL;
    }
}

pub struct Enricher {
    client: reqwest::Client,
    bucket: Arc<TokenBucket>,
    noise_brackets: Regex,
    feat_suffix: Regex,
}

impl Enricher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            bucket: Arc::new(TokenBucket::new()),
            noise_brackets: Regex::new(
                r"(?i)[(\[](official|video|audio|lyrics|hq|hd|4k|music video)[^)\]]*[)\]]",
            )
            .expect("static regex"),
            feat_suffix: Regex::new(r"(?i)\s(ft\.|feat\.|featuring)\s.*").expect("static regex"),
        }
    }

    /// Best-effort lookup; any failure (no result, transport error, non-2xx)
    /// surfaces as `Error::EnrichmentMiss` for the pipeline to fall back on.
    pub async fn lookup(&self, artist: &str, title: &str) -> Result<EnrichedMetadata> {
        self.bucket.acquire().await;

        let clean_artist = self.clean(artist);
        let clean_title = self.clean(title);
        let query = format!("{clean_artist} {clean_title}").trim().to_string();
        let country = detect_store_country(&query);

        let mut request = self
            .client
            .get(ITUNES_SEARCH_URL)
            .query(&[("term", query.as_str()), ("entity", "song"), ("limit", "1")]);
        if let Some(country) = country {
            request = request.query(&[("country", country)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::EnrichmentMiss(format!("transport error: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::EnrichmentMiss(format!(
                "iTunes API returned status {}",
                response.status()
            )));
        }

        let parsed: ITunesResponse = response
            .json()
            .await
            .map_err(|e| Error::EnrichmentMiss(format!("invalid response body: {e}")))?;

        if parsed.result_count == 0 || parsed.results.is_empty() {
            return Err(Error::EnrichmentMiss("no results found".to_string()));
        }

        let item = &parsed.results[0];
        let year = item
            .release_date
            .as_ref()
            .filter(|d| d.len() >= 4)
            .map(|d| d[..4].to_string());
        let artwork_url = item
            .artwork_url_100
            .as_ref()
            .map(|url| url.replace("100x100bb", "600x600bb"));

        Ok(EnrichedMetadata {
            title: item.track_name.clone(),
            artist: item.artist_name.clone(),
            album: item.collection_name.clone().unwrap_or_default(),
            year,
            genre: item.primary_genre_name.clone(),
            artwork_url,
        })
    }

    fn clean(&self, s: &str) -> String {
        let s = self.noise_brackets.replace_all(s, "");
        let s = self.feat_suffix.replace_all(&s, "");
        s.trim().to_string()
    }
}

/// Maps the first recognized Unicode-range character in `s` to an iTunes
/// store country code; `None` defers to the global/US default store.
fn detect_store_country(s: &str) -> Option<&'static str> {
    for c in s.chars() {
        let code = c as u32;
        match code {
            0x0590..=0x05FF => return Some("IL"),
            0x0400..=0x04FF => return Some("RU"),
            0x0600..=0x06FF => return Some("EG"),
            0x3040..=0x30FF | 0x4E00..=0x9FFF => return Some("JP"),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enricher() -> Enricher {
        Enricher::new(reqwest::Client::new())
    }

    #[test]
    fn clean_strips_bracketed_noise_and_feat_suffix() {
        let e = enricher();
        assert_eq!(e.clean("Song Title (Official Video)"), "Song Title");
        assert_eq!(e.clean("Song Title [HQ Audio]"), "Song Title");
        assert_eq!(e.clean("Song Title feat. Someone Else"), "Song Title");
    }

    #[test]
    fn clean_leaves_plain_titles_untouched() {
        let e = enricher();
        assert_eq!(e.clean("Plain Title"), "Plain Title");
    }

    #[test]
    fn detect_store_country_maps_scripts() {
        assert_eq!(detect_store_country("שלום"), Some("IL"));
        assert_eq!(detect_store_country("привет"), Some("RU"));
        assert_eq!(detect_store_country("مرحبا"), Some("EG"));
        assert_eq!(detect_store_country("こんにちは"), Some("JP"));
        assert_eq!(detect_store_country("hello"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn token_bucket_serializes_rapid_acquisitions() {
        let bucket = TokenBucket::new();
        let start = Instant::now();
        bucket.acquire().await;
        bucket.acquire().await;
        assert!(start.elapsed() >= RATE_INTERVAL);
    }
}
