//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
///
/// Variants name distinct outcomes rather than implementation details; several
/// are non-fatal by convention (the pipeline treats them as "continue anyway"
/// signals, see `pipeline::AcquisitionPipeline`).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("A group with reference '{0}' is already queued")]
    AlreadyQueued(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Video is not playable: {0}")]
    NotPlayable(String),

    #[error("No audio stream found")]
    NoAudioStream,

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Transcode failed: {0}")]
    TranscodeFailure(String),

    #[error("Metadata enrichment miss: {0}")]
    EnrichmentMiss(String),

    #[error("Not enough free disk space (need at least {needed_bytes} bytes)")]
    OutOfSpace { needed_bytes: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
