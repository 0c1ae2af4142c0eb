// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lookup server built on axum.
//!
//! Sets up routes, middleware, and shared state for the lookup service.

use std::sync::Arc;
use std::time::Instant;

use axum::{Router, routing::get};
use betasign_core::{BetasignError, PluginAdapter, RecordStore};
use betasign_refresh::RefreshHandle;
use betasign_resilience::ConcurrencyLimiter;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// State behind the health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
    /// Prometheus render function; `/metrics` answers 404 without one.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    /// Running refresh loop, if this process hosts one.
    pub refresh: Option<RefreshHandle>,
    /// Outbound limiter whose in-flight count is sampled on scrape.
    pub limiter: Option<ConcurrencyLimiter>,
    /// Adapters other than the store whose health `/health` reports.
    pub adapters: Vec<Arc<dyn PluginAdapter>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            prometheus_render: None,
            refresh: None,
            limiter: None,
            adapters: Vec::new(),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub store: Arc<dyn RecordStore>,
    pub health: HealthState,
}

/// Lookup server bind address.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the lookup router:
/// - GET /betas/{identifier}
/// - GET /health
/// - GET /metrics
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/betas/{identifier}", get(handlers::get_betas))
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until `shutdown` fires. In-flight requests are drained.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), BetasignError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BetasignError::Network {
            message: format!("failed to bind lookup service to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    serve(listener, state, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` fires.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), BetasignError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "lookup service listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| BetasignError::Network {
            message: format!("lookup service error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("lookup service stopped");
    Ok(())
}
