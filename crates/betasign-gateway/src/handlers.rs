// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the lookup service.
//!
//! Handles GET /betas/{identifier}, GET /health, GET /metrics.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use betasign_core::{AdapterType, HealthStatus, PluginAdapter};
use betasign_refresh::{CycleReport, RefreshState};
use serde::{Deserialize, Serialize};

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` when every adapter is healthy and the store can be read,
    /// `unhealthy` when any adapter is down, `degraded` otherwise.
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Refresh loop state, absent when this process runs no loop.
    #[serde(default)]
    pub refresh_state: Option<String>,
    #[serde(default)]
    pub stored_records: Option<u64>,
    /// Summary of the last committed cycle.
    #[serde(default)]
    pub last_cycle: Option<serde_json::Value>,
    /// The store first, then every other wired adapter.
    #[serde(default)]
    pub adapters: Vec<AdapterHealth>,
}

/// One adapter's identity and health check result.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdapterHealth {
    pub name: String,
    pub kind: AdapterType,
    pub version: String,
    /// `healthy`, `degraded`, or `unhealthy`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Run one adapter's health check. A failed check counts as unhealthy.
async fn check_adapter<A: PluginAdapter + ?Sized>(adapter: &A) -> (HealthStatus, AdapterHealth) {
    let status = adapter
        .health_check()
        .await
        .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
    if status != HealthStatus::Healthy {
        tracing::warn!(adapter = adapter.name(), status = status.label(), "adapter not healthy");
    }
    let health = AdapterHealth {
        name: adapter.name().to_string(),
        kind: adapter.adapter_type(),
        version: adapter.version().to_string(),
        status: status.label().to_string(),
        detail: status.detail().map(str::to_string),
    };
    (status, health)
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// GET /betas/{identifier}
///
/// Every stored record for the device, newest build first. The identifier
/// matches case-insensitively. No records is a 404, not an empty array.
pub async fn get_betas(
    State(state): State<GatewayState>,
    Path(identifier): Path<String>,
) -> Response {
    match state.store.query(&identifier).await {
        Ok(records) if records.is_empty() => error_response(
            StatusCode::NOT_FOUND,
            format!("no betas found for {identifier}"),
        ),
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => {
            tracing::error!(device = %identifier, error = %e, "record query failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "record query failed")
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let mut statuses = Vec::with_capacity(state.health.adapters.len() + 1);
    let mut adapters = Vec::with_capacity(state.health.adapters.len() + 1);
    let (status, health) = check_adapter(state.store.as_ref()).await;
    statuses.push(status);
    adapters.push(health);
    for adapter in &state.health.adapters {
        let (status, health) = check_adapter(adapter.as_ref()).await;
        statuses.push(status);
        adapters.push(health);
    }

    let stored_records = match state.store.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not count records");
            None
        }
    };

    let status = if statuses
        .iter()
        .any(|s| matches!(s, HealthStatus::Unhealthy(_)))
    {
        "unhealthy"
    } else if stored_records.is_none() || statuses.iter().any(|s| *s != HealthStatus::Healthy) {
        "degraded"
    } else {
        "ok"
    };

    let refresh = state.health.refresh.as_ref();
    let refresh_state = refresh.map(|handle| handle.state());
    let last_cycle = refresh
        .and_then(|handle| handle.last_report())
        .and_then(|report: CycleReport| serde_json::to_value(report).ok());

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        refresh_state: refresh_state.map(|s: RefreshState| s.to_string()),
        stored_records,
        last_cycle,
        adapters,
    })
}

/// GET /metrics
///
/// Prometheus text format, or 404 when metrics are disabled.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    let Some(render) = state.health.prometheus_render.as_ref() else {
        return error_response(StatusCode::NOT_FOUND, "metrics are disabled");
    };
    if let Some(limiter) = &state.health.limiter {
        betasign_prometheus::set_in_flight(limiter.in_flight());
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(),
    )
        .into_response()
}
