use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use rbxservers_core::Page;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ServersQuery {
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServersResponse {
    pub success: bool,
    pub data: Page,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the server started
    pub uptime: f64,
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let cfg = &state.config;
    let body = json!({
        "ok": true,
        "name": "rbxservers",
        "version": env!("CARGO_PKG_VERSION"),
        "placeId": cfg.upstream.place_id,
        "endpoints": ["/servers", "/health", "/metrics"],
        "cacheTtlMs": cfg.cache.ttl_ms,
        "preloadIntervalMs": cfg.preload.interval_ms,
        "preloadEnabled": cfg.preload.enabled,
    });
    (StatusCode::OK, Json(body))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            timestamp: now_rfc3339(),
            uptime: state.started_at.elapsed().as_secs_f64(),
        }),
    )
}

/// One page of the server list, from cache or upstream.
pub async fn servers(
    State(state): State<AppState>,
    Query(query): Query<ServersQuery>,
) -> Result<Json<ServersResponse>, ApiError> {
    let page = state.service.get_page(query.cursor.as_deref()).await?;

    Ok(Json(ServersResponse {
        success: true,
        data: page,
        timestamp: now_rfc3339(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let rendered = state
        .config
        .metrics
        .enabled
        .then(crate::metrics::render_metrics)
        .flatten();

    match rendered {
        Some(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Metrics disabled" })),
        )
            .into_response(),
    }
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
