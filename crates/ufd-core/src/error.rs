//! Error types for UFD core

use thiserror::Error;

/// Shown alongside a 403 during size discovery
pub const ACCESS_DENIED_GUIDANCE: &str = "This site appears to be behind bot protection \
(e.g. Cloudflare) or the content is access-restricted.\n\
Try downloading the file with a browser, or contact the site administrator.";

/// Errors that can occur in UFD core
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error {status}: access denied\n\n{guidance}")]
    AccessDenied { status: u16, guidance: &'static str },

    #[error("Network error {status}: {reason}")]
    HttpStatus { status: u16, reason: String },

    #[error("Server error {status}")]
    ServerError { status: u16 },

    #[error("Request timed out")]
    Timeout,

    #[error("Cannot determine file size: server sent no Content-Length")]
    UnknownSize,

    #[error("Server ignored the range request for segment {segment}")]
    RangeNotHonored { segment: u32 },

    #[error("Segment {segment} ended early: expected {expected} bytes, received {received}")]
    SegmentIncomplete {
        segment: u32,
        expected: u64,
        received: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Segment task failed: {0}")]
    TaskFailed(String),
}

impl DownloadError {
    /// Check if this error is retryable during size discovery
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Timeout => true,
            DownloadError::ServerError { status } => *status >= 500,
            DownloadError::Network(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Map a non-success HTTP status to the matching error kind
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        let code = status.as_u16();
        if status == reqwest::StatusCode::FORBIDDEN {
            DownloadError::AccessDenied {
                status: code,
                guidance: ACCESS_DENIED_GUIDANCE,
            }
        } else if status.is_server_error() {
            DownloadError::ServerError { status: code }
        } else {
            DownloadError::HttpStatus {
                status: code,
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for DownloadError {
    fn from(error: serde_json::Error) -> Self {
        DownloadError::Serialization(error.to_string())
    }
}
