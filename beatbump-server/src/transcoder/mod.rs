//! Transcoder Invoker: builds the external encoder's argument list and
//! invokes it synchronously (spec §4.3).

use std::path::Path;
use std::process::Stdio;

use process_utils::tokio_command;

use crate::error::{Error, Result};

/// Tags written onto the transcoded file; `year`/`genre` are optional because
/// enrichment is best-effort and group-provided fallback metadata rarely has them.
#[derive(Debug, Clone, Default)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<String>,
    pub genre: Option<String>,
}

/// Wraps invocation of the `ffmpeg` binary. Holds no state beyond the probed
/// availability, mirroring the upstream's free-function `IsFFmpegAvailable`.
pub struct Transcoder {
    binary: String,
}

impl Transcoder {
    pub fn new() -> Self {
        Self { binary: "ffmpeg".to_string() }
    }

    /// Probes whether the encoder is on the executable search path. The
    /// pipeline treats an absent encoder as "keep the original container"
    /// rather than a hard failure.
    pub async fn is_available(&self) -> bool {
        tokio_command(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Converts `input_path` to MP3 at `output_path`, embedding `tags` and,
    /// if `cover_path` is given, attaching it as front cover art.
    pub async fn convert_to_mp3(
        &self,
        input_path: &Path,
        output_path: &Path,
        cover_path: Option<&Path>,
        tags: &TrackTags,
    ) -> Result<()> {
        let mut cmd = tokio_command(&self.binary);
        cmd.arg("-y").arg("-i").arg(input_path);

        if let Some(cover) = cover_path {
            cmd.arg("-i")
                .arg(cover)
                .args(["-map", "0:a"])
                .args(["-map", "1:0"])
                .args(["-c:v", "copy"])
                .args(["-disposition:v:0", "attached_pic"]);
        } else {
            cmd.args(["-map", "0:a"]);
        }

        cmd.args(["-c:a", "libmp3lame"])
            .args(["-q:a", "0"])
            .args(["-id3v2_version", "3"])
            .arg("-metadata")
            .arg(format!("title={}", tags.title))
            .arg("-metadata")
            .arg(format!("artist={}", tags.artist))
            .arg("-metadata")
            .arg(format!("album={}", tags.album));

        if let Some(year) = &tags.year {
            cmd.arg("-metadata").arg(format!("date={year}"));
        }
        if let Some(genre) = &tags.genre {
            cmd.arg("-metadata").arg(format!("genre={genre}"));
        }

        cmd.arg(output_path);
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|e| Error::TranscodeFailure(format!("failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::TranscodeFailure(format!(
                "ffmpeg exited with {}: {}",
                output.status, stderr
            )));
        }

        Ok(())
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn is_available_returns_false_for_missing_binary() {
        let transcoder = Transcoder { binary: "definitely-not-a-real-binary-xyz".to_string() };
        assert!(!transcoder.is_available().await);
    }
}
