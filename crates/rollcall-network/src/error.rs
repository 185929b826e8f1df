//! Error types for remote directory access

use thiserror::Error;

/// Result alias for directory operations
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Errors returned by a [`GuestDirectory`](crate::GuestDirectory)
///
/// None of these are fatal to a station: every variant means "try again
/// later" to the sync coordinator, which keeps entries queued locally.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Directory could not be reached (DNS, connect, offline)
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    /// Request did not complete in time
    #[error("Directory request timed out after {0}ms")]
    Timeout(u64),

    /// Remote API quota exhausted (HTTP 429)
    #[error("Directory quota exceeded")]
    QuotaExceeded,

    /// Remote API answered with a non-success status
    #[error("Directory API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Invalid directory payload: {0}")]
    InvalidPayload(String),

    /// Directory client misconfigured
    #[error("Directory configuration error: {0}")]
    Config(String),

    /// Transport error not covered above
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DirectoryError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload(reason.into())
    }

    /// Whether the directory is unreachable, as opposed to answering with an error.
    pub fn is_offline(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Timeout(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
