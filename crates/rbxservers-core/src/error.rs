use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the upstream client and propagated verbatim by the
/// page service to every caller waiting on the same fetch.
///
/// `Clone` so one failed fetch can be delivered to all of its joiners.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    #[error("Invalid upstream request: {0}")]
    InvalidRequest(String),

    #[error("Upstream still failing after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<UpstreamError>,
    },

    #[error("Page fetch task aborted: {0}")]
    TaskAborted(String),
}

impl UpstreamError {
    /// Create a new Status error
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Whether this failure class is expected to clear up on retry
    /// (rate limiting, server errors, timeouts).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout(_) => true,
            Self::RetriesExhausted { last, .. } => last.is_transient(),
            Self::Network(_) | Self::Decode(_) | Self::InvalidRequest(_) | Self::TaskAborted(_) => {
                false
            }
        }
    }

    /// HTTP status reported by upstream, if the failure carried one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status_code(),
            _ => None,
        }
    }

    /// Error message supplied by upstream in the response body, if any.
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } if !message.is_empty() => Some(message),
            Self::RetriesExhausted { last, .. } => last.upstream_message(),
            _ => None,
        }
    }

    /// Message suitable for API clients: the upstream message when present,
    /// otherwise the error description.
    pub fn client_message(&self) -> String {
        self.upstream_message()
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string())
    }
}
