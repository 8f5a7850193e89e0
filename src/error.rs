//! Centralized error types for gmail-attachment-dl.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the gmail-attachment-dl library.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The HTTP request could not be sent or its response not read.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Gmail API answered with a non-success status.
    #[error("Gmail API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// A JSON document could not be decoded.
    #[error("JSON decoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// A base64url payload could not be decoded.
    #[error("base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A filter expression failed to compile.
    #[error("Invalid regular expression '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// No usable credentials could be obtained.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Rendering the fallback document failed.
    #[error("Document rendering failed: {0}")]
    Render(String),

    /// Document rendering is not available in this environment.
    #[error("Document rendering unavailable: {0}")]
    RendererUnavailable(String),

    /// The configuration file could not be parsed.
    #[error("Invalid configuration in '{path}': {reason}")]
    InvalidConfig { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, DownloadError>`.
pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `DownloadError::io`).
impl From<std::io::Error> for DownloadError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
