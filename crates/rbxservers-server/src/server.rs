use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{Router, middleware, routing::get};
use rbxservers_core::{PageService, UpstreamClient, WarmLoop};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::AppConfig, handlers, middleware as app_middleware};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: PageService,
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the upstream client and page service for `cfg`.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let client = UpstreamClient::new(cfg.upstream_config())?;
        let service = PageService::new(Arc::new(client), cfg.cache_ttl());
        Ok(Self {
            service,
            config: Arc::new(cfg.clone()),
            started_at: Instant::now(),
        })
    }
}

pub struct RbxServersServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
}

/// Build the router with a fresh page service for `cfg`.
pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(cfg)?;
    Ok(build_router(state))
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/servers", get(handlers::servers))
        .route("/metrics", get(handlers::metrics))
        .fallback(handlers::not_found)
        .with_state(state)
        // Middleware stack (order: request id -> metrics -> cors/trace -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(middleware::from_fn(app_middleware::track_metrics))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<RbxServersServer> {
        let state = AppState::from_config(&self.config)?;
        let app = build_router(state.clone());

        Ok(RbxServersServer {
            addr: self.addr,
            app,
            state,
        })
    }
}

impl RbxServersServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let cfg = Arc::clone(&self.state.config);

        if cfg.metrics.enabled {
            crate::metrics::init_metrics();
        }

        // The warm loop lives as long as the runtime; it never holds the listener open.
        let warm = cfg.preload.enabled.then(|| {
            WarmLoop::new(self.state.service.clone(), cfg.preload_interval()).spawn()
        });

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(
            addr = %self.addr,
            place_id = cfg.upstream.place_id,
            cache_ttl_ms = cfg.cache.ttl_ms,
            preload = cfg.preload.enabled,
            "listening"
        );

        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        if let Some(handle) = warm {
            handle.abort();
        }
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
