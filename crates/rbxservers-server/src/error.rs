//! HTTP mapping of page fetch failures.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rbxservers_core::UpstreamError;
use serde_json::json;

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The page could not be obtained from cache or upstream.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Upstream(err) => {
                tracing::warn!(
                    error = %err,
                    status = ?err.status_code(),
                    transient = err.is_transient(),
                    "Page request failed"
                );
                err.client_message()
            }
        };

        let body = json!({
            "success": false,
            "error": message,
        });

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
