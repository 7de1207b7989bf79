//! Upstream listing client.
//!
//! Fetches one page of the public server list of a place from the Roblox
//! games API, retrying transient failures with linear backoff.
//!
//! # Failure classes
//!
//! - **Transient** (retried): HTTP 429, HTTP 5xx, request timeout
//! - **Permanent** (returned immediately): any other status, undecodable
//!   body, connection or DNS errors
//!
//! After failed attempt `n` the client sleeps `backoff_unit * n` before the
//! next one. A transient failure on the last attempt is reported as
//! [`UpstreamError::RetriesExhausted`] wrapping the last observed error.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header;
use serde_json::Value;
use url::Url;

use crate::cursor::CursorKey;
use crate::error::UpstreamError;
use crate::metrics;
use crate::page::Page;

/// `User-Agent` sent with every upstream request.
pub const USER_AGENT: &str = concat!("rbxservers/", env!("CARGO_PKG_VERSION"));

/// Largest page the upstream API serves.
pub const MAX_PAGE_SIZE: u32 = 100;

const SORT_ORDER: &str = "Desc";

/// Anything that can produce a page for a cursor key.
///
/// [`UpstreamClient`] is the production implementation; the page service
/// only depends on this trait.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, key: &CursorKey) -> Result<Page, UpstreamError>;
}

/// Configuration for the upstream client.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the games API (default: `https://games.roblox.com`).
    pub base_url: String,

    /// Place whose public servers are listed.
    pub place_id: u64,

    /// Servers per page, at most [`MAX_PAGE_SIZE`] (default: 100).
    pub page_size: u32,

    /// Timeout for a single attempt (default: 10 seconds).
    pub request_timeout: Duration,

    /// Total attempts per fetch, including the first (default: 4).
    pub max_attempts: u32,

    /// Backoff unit; the delay after attempt `n` is `n` units (default: 300ms).
    pub backoff_unit: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://games.roblox.com".to_string(),
            place_id: 109_983_668_079_237,
            page_size: MAX_PAGE_SIZE,
            request_timeout: Duration::from_secs(10),
            max_attempts: 4,
            backoff_unit: Duration::from_millis(300),
        }
    }
}

impl UpstreamConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_place_id(mut self, place_id: u64) -> Self {
        self.place_id = place_id;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Listing endpoint for the configured place.
    pub fn endpoint(&self) -> Result<Url, UpstreamError> {
        let raw = format!(
            "{}/v1/games/{}/servers/Public",
            self.base_url.trim_end_matches('/'),
            self.place_id
        );
        Url::parse(&raw).map_err(|e| UpstreamError::InvalidRequest(format!("{raw}: {e}")))
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

/// HTTP client for the upstream server list.
pub struct UpstreamClient {
    http_client: reqwest::Client,
    endpoint: Url,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Creates a client for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidRequest`] if the endpoint URL cannot be
    /// built or the HTTP client cannot be created.
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let endpoint = config.endpoint()?;
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
            config,
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Full request URL for a page, including the fixed query parameters.
    pub fn page_url(&self, key: &CursorKey) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("limit", &self.config.page_size.to_string())
                .append_pair("sortOrder", SORT_ORDER);
            if let Some(cursor) = key.cursor() {
                query.append_pair("cursor", cursor);
            }
            query.append_pair("excludeFullGames", "true");
        }
        url
    }

    /// Fetches one page, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the first permanent error, or
    /// [`UpstreamError::RetriesExhausted`] when the last attempt failed
    /// transiently.
    pub async fn fetch_page(&self, key: &CursorKey) -> Result<Page, UpstreamError> {
        let url = self.page_url(key);
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let start = Instant::now();
            let result = self.fetch_once(&url).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(page) => {
                    metrics::record_upstream_attempt("ok");
                    tracing::debug!(
                        cursor = %key,
                        attempt,
                        entries = ?page.entry_count(),
                        elapsed_ms,
                        "Fetched upstream page"
                    );
                    return Ok(page);
                }
                Err(err) if err.is_transient() => {
                    metrics::record_upstream_attempt("transient");
                    if attempt >= max_attempts {
                        tracing::warn!(
                            cursor = %key,
                            attempts = attempt,
                            error = %err,
                            "Upstream retries exhausted"
                        );
                        return Err(UpstreamError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }

                    let delay = self.config.backoff_after(attempt);
                    tracing::warn!(
                        cursor = %key,
                        attempt,
                        status = ?err.status_code(),
                        delay_ms = delay.as_millis() as u64,
                        elapsed_ms,
                        error = %err,
                        "Transient upstream failure, retrying"
                    );
                    metrics::record_upstream_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    metrics::record_upstream_attempt("permanent");
                    tracing::warn!(
                        cursor = %key,
                        attempt,
                        status = ?err.status_code(),
                        elapsed_ms,
                        error = %err,
                        "Upstream request failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<Page, UpstreamError> {
        let response = self
            .http_client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_default();
            return Err(UpstreamError::status(status.as_u16(), message));
        }

        let value: Value = response.json().await.map_err(|e| self.classify(e))?;
        Ok(Page::new(value))
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.config.request_timeout)
        } else if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else if err.is_builder() {
            UpstreamError::InvalidRequest(err.to_string())
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl PageSource for UpstreamClient {
    async fn fetch(&self, key: &CursorKey) -> Result<Page, UpstreamError> {
        self.fetch_page(key).await
    }
}

/// Pulls the human-readable message out of an upstream error body.
///
/// Understands the Roblox shape `{"errors":[{"code":..,"message":..}]}` and a
/// plain `{"message":..}`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    let message = value
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|first| first.get("message"))
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)?;

    (!message.is_empty()).then(|| message.to_string())
}
