//! Remote directory configuration

use rollcall_core::constants::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_REQUESTS_PER_MINUTE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the HTTP guest directory
///
/// # Example
///
/// ```
/// use rollcall_network::DirectoryConfig;
/// use std::time::Duration;
///
/// let config = DirectoryConfig::new("https://sheets.example.org/event/")
///     .with_api_token("secret")
///     .with_requests_per_minute(30);
///
/// assert_eq!(config.requests_per_minute, 30);
/// assert_eq!(config.request_timeout(), Duration::from_millis(8000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Base URL of the directory API
    pub endpoint: String,

    /// Bearer token; omitted from requests when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Request budget per rolling minute
    pub requests_per_minute: u32,
}

impl DirectoryConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_requests_per_minute(mut self, limit: u32) -> Self {
        self.requests_per_minute = limit;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Whether an endpoint has been configured at all.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
        }
    }
}
