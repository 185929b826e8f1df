//! HTTP client for the spreadsheet-backed guest directory.
//!
//! The directory is fronted by a small JSON API:
//!
//! ```text
//! GET  {endpoint}/guests              -> {"guests": [{"guest_id", "name", "stations": {key: cell}}]}
//! POST {endpoint}/cells:batchUpdate   <- {"updates": [{"guest_id", "station", "value"}]}
//!                                     -> {"results": [{"ok": true} | {"ok": false, "error": "..."}]}
//! GET  {endpoint}/health              -> 2xx
//! ```
//!
//! Cells travel in their spreadsheet form: empty string, a timestamp, or
//! the absent sentinel. Stations are addressed by column key.
//!
//! # Design
//!
//! - **No retry**: the sync coordinator owns retry and backoff.
//! - **Paced**: every request first takes a slot from the [`RateLimiter`].
//! - **Bounded**: every request carries the configured timeout.

use crate::config::DirectoryConfig;
use crate::directory::{CellStatus, GuestDirectory};
use crate::error::{DirectoryError, DirectoryResult};
use crate::rate_limit::RateLimiter;
use chrono::Utc;
use reqwest::StatusCode;
use rollcall_core::{CellUpdate, DirectorySnapshot, GuestRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Longest response excerpt kept in an error message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct GuestsResponse {
    guests: Vec<GuestRecord>,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    updates: Vec<WireCell<'a>>,
}

#[derive(Debug, Serialize)]
struct WireCell<'a> {
    guest_id: &'a str,
    station: &'a str,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<CellResult>,
}

#[derive(Debug, Deserialize)]
struct CellResult {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// [`GuestDirectory`] over HTTP
///
/// # Example
///
/// ```no_run
/// use rollcall_network::{DirectoryConfig, GuestDirectory, SheetClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SheetClient::new(
///     DirectoryConfig::new("https://sheets.example.org/event").with_api_token("secret"),
/// )?;
/// let snapshot = client.fetch_snapshot().await?;
/// println!("{} guests", snapshot.guests.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SheetClient {
    base_url: String,
    api_token: Option<String>,
    timeout_ms: u64,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl SheetClient {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the endpoint is not an http(s) URL or the HTTP
    /// client cannot be constructed.
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        let base_url = normalize_base_url(&config.endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DirectoryError::Config(format!("failed to build HTTP client: {e}")))?;

        debug!(endpoint = %base_url, "directory client created");
        Ok(Self {
            base_url,
            api_token: config.api_token,
            timeout_ms: config.request_timeout_ms,
            client,
            limiter: RateLimiter::per_minute(config.requests_per_minute),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, route: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{}", self.base_url, route))
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> DirectoryResult<reqwest::Response> {
        self.limiter.acquire().await;

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("directory quota exceeded");
            return Err(DirectoryError::QuotaExceeded);
        }

        let body = response.text().await.unwrap_or_default();
        Err(DirectoryError::api(status.as_u16(), compact(&body)))
    }

    fn classify(&self, error: reqwest::Error) -> DirectoryError {
        if error.is_timeout() {
            DirectoryError::Timeout(self.timeout_ms)
        } else if error.is_connect() {
            DirectoryError::unavailable(error.to_string())
        } else {
            DirectoryError::Http(error)
        }
    }
}

impl GuestDirectory for SheetClient {
    async fn fetch_snapshot(&self) -> DirectoryResult<DirectorySnapshot> {
        let response = self
            .send(self.request(reqwest::Method::GET, "/guests"))
            .await?;
        let payload: GuestsResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::invalid_payload(e.to_string()))?;

        debug!(guests = payload.guests.len(), "directory snapshot fetched");
        Ok(DirectorySnapshot::new(Utc::now(), payload.guests))
    }

    async fn write_cells(&self, updates: &[CellUpdate]) -> DirectoryResult<Vec<CellStatus>> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }

        let body = BatchRequest {
            updates: updates
                .iter()
                .map(|u| WireCell {
                    guest_id: u.guest_id.as_str(),
                    station: u.station.key(),
                    value: u.value.to_wire(),
                })
                .collect(),
        };

        let response = self
            .send(
                self.request(reqwest::Method::POST, "/cells:batchUpdate")
                    .json(&body),
            )
            .await?;

        let text = response.text().await.map_err(|e| self.classify(e))?;
        let payload: BatchResponse = if text.trim().is_empty() {
            BatchResponse::default()
        } else {
            serde_json::from_str(&text).map_err(|e| DirectoryError::invalid_payload(e.to_string()))?
        };

        let statuses = batch_statuses(payload, updates.len())?;
        let rejected = statuses.iter().filter(|s| !s.is_written()).count();
        info!(cells = updates.len(), rejected, "directory batch written");
        Ok(statuses)
    }

    async fn ping(&self) -> DirectoryResult<()> {
        self.send(self.request(reqwest::Method::GET, "/health"))
            .await
            .map(|_| ())
    }
}

/// Map a batch response to per-update statuses.
///
/// An empty result list means the whole batch was accepted.
fn batch_statuses(payload: BatchResponse, expected: usize) -> DirectoryResult<Vec<CellStatus>> {
    if payload.results.is_empty() {
        return Ok(vec![CellStatus::Written; expected]);
    }
    if payload.results.len() != expected {
        return Err(DirectoryError::invalid_payload(format!(
            "expected {expected} results, got {}",
            payload.results.len()
        )));
    }
    Ok(payload
        .results
        .into_iter()
        .map(|r| {
            if r.ok {
                CellStatus::Written
            } else {
                CellStatus::Rejected(r.error.unwrap_or_else(|| "rejected".to_string()))
            }
        })
        .collect())
}

fn normalize_base_url(raw: &str) -> DirectoryResult<String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err(DirectoryError::Config(
            "directory endpoint must not be empty".to_string(),
        ));
    }
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(DirectoryError::Config(
            "directory endpoint must include http:// or https://".to_string(),
        ));
    }
    Ok(base)
}

fn compact(body: &str) -> String {
    let line = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() > MAX_ERROR_BODY {
        let cut: String = line.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}...")
    } else {
        line
    }
}
