//! Error types for lyricsift-harvest
//!
//! Per-track failures are not errors: they are reported through the outcome
//! enums in `gate`, `retry` and `worker`. `HarvestError` covers what stops a
//! worker or a whole job (unreadable input, unwritable output, bad config).

use thiserror::Error;

/// Harvest error type
#[derive(Debug, Error)]
pub enum HarvestError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TSV read/write error
    #[error("TSV error: {0}")]
    Tsv(#[from] csv::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input file is unusable as a whole (e.g. missing required column)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(String),

    /// lyricsift-common error
    #[error("Common error: {0}")]
    Common(#[from] lyricsift_common::Error),
}

/// Result type for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;
