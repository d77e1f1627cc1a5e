//! Error type definitions for the radio application.
//!
//! This module defines all error types used throughout the application,
//! providing a hierarchical error system that makes debugging and error
//! handling more straightforward.

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Persistent-store layer errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Ingestion worker errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Web layer errors
    #[error("Web error: {0}")]
    Web(#[from] WebError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Persistent-store specific errors (beyond what `sqlx::Error` already conveys).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Migration failures
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed { version: String, message: String },

    /// A config value exists but does not parse as the expected type
    #[error("Config key '{key}' has invalid value '{value}': {message}")]
    InvalidConfigValue {
        key: String,
        value: String,
        message: String,
    },
}

/// Ingestion worker / media pipeline specific errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The external downloader (e.g. yt-dlp) failed or timed out
    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    /// The external transcoder (ffmpeg) failed or timed out
    #[error("Transcode failed: {message}")]
    TranscodeFailed { message: String },

    /// The external prober (ffprobe) failed or returned unparseable output
    #[error("Probe failed: {message}")]
    ProbeFailed { message: String },

    /// Feature extraction (decode/DSP) failed
    #[error("Feature extraction failed: {message}")]
    FeatureExtractionFailed { message: String },

    /// No raw file found on disk for an upload-sourced track
    #[error("Raw upload file not found for track {track_id}")]
    RawFileMissing { track_id: String },

    /// An external process call exceeded its wall-clock timeout
    #[error("External process '{tool}' timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },
}

/// Scheduler specific errors. Per the design, "no candidate" is not an error —
/// it is represented as `Ok(None)` — so this type only covers store failures
/// surfacing through the scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler store access failed: {0}")]
    Store(#[from] sqlx::Error),
}

/// Web layer specific errors
#[derive(Error, Debug)]
pub enum WebError {
    /// Invalid request format
    #[error("Invalid request: {field} - {message}")]
    InvalidRequest { field: String, message: String },

    /// Request payload too large
    #[error("Payload too large: {size} bytes (max: {max_size})")]
    PayloadTooLarge { size: usize, max_size: usize },

    /// Unsupported file type
    #[error("Unsupported file type: {extension}")]
    UnsupportedFileType { extension: String },

    /// Per-submitter pending-job cap exceeded
    #[error("Submitter '{submitter}' already has {pending} tracks pending or processing")]
    PendingCapExceeded { submitter: String, pending: i64 },

    /// Missing or invalid admin token
    #[error("Invalid or missing admin token")]
    Unauthorized,

    /// Admin token not configured server-side
    #[error("Admin token not configured")]
    AdminTokenNotConfigured,
}

impl AppError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl StoreError {
    pub fn record_not_found<T: Into<String>, F: Into<String>, V: Into<String>>(
        table: T,
        field: F,
        value: V,
    ) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.into(),
        }
    }
}

impl WebError {
    pub fn invalid_request<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidRequest {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Truncate external-tool stderr to its last ~500 bytes, per the error
/// propagation rule: only the tail is kept, on a UTF-8 char boundary.
pub fn truncate_tail(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let start = s.len() - max_bytes;
    let mut start = start;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_tail_keeps_short_strings_whole() {
        assert_eq!(truncate_tail("short", 500), "short");
    }

    #[test]
    fn truncate_tail_truncates_long_strings() {
        let long = "x".repeat(1000);
        let truncated = truncate_tail(&long, 500);
        assert_eq!(truncated.len(), 500);
    }

    #[test]
    fn truncate_tail_respects_char_boundaries() {
        let s = "é".repeat(400); // 2 bytes each -> 800 bytes
        let truncated = truncate_tail(&s, 500);
        assert!(truncated.len() <= 501);
        assert!(String::from_utf8(truncated.into_bytes()).is_ok());
    }
}
