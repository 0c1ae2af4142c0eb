// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lookup service routes exercised through the router without a socket.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use betasign_config::model::StorageConfig;
use betasign_core::{AdapterType, PluginAdapter, RecordStore, SigningRecord};
use betasign_gateway::handlers::HealthResponse;
use betasign_gateway::{GatewayState, HealthState, router};
use betasign_resilience::ConcurrencyLimiter;
use betasign_sources::FileSource;
use betasign_storage::{Database, SqliteStore};
use betasign_test_utils::candidate;
use chrono::{TimeZone, Utc};
use tower::ServiceExt;

async fn seeded_store() -> Arc<SqliteStore> {
    let db = Database::open_in_memory().await.unwrap();
    let store = Arc::new(SqliteStore::from_database(StorageConfig::default(), db));
    let checked_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    for (build, signed) in [("19A5281j", false), ("20A5283p", true), ("19A5339a", false)] {
        let fw = candidate("https://updates.example.com", build, &["iPhone10,3"]);
        store
            .upsert(&SigningRecord::from_candidate(&fw, "iPhone10,3", signed, checked_at))
            .await
            .unwrap();
    }
    store
}

fn state(store: Arc<SqliteStore>) -> GatewayState {
    GatewayState {
        store,
        health: HealthState::new(),
    }
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn betas_are_listed_newest_build_first() {
    let app = router(state(seeded_store().await));

    let (status, body) = get(app, "/betas/iPhone10,3").await;

    assert_eq!(status, StatusCode::OK);
    let records: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    let builds: Vec<&str> = records
        .iter()
        .map(|r| r["buildid"].as_str().unwrap())
        .collect();
    assert_eq!(builds, vec!["20A5283p", "19A5339a", "19A5281j"]);
    assert_eq!(records[0]["signed"], true);
    assert_eq!(records[0]["device"], "iPhone10,3");
    assert_eq!(
        records[0]["url"],
        "https://updates.example.com/fw/20A5283p/Restore.ipsw"
    );
    assert!(records[0]["filesize"].is_u64());
    assert!(records[0]["version"].is_string());
    assert!(records[0]["checked_at"].is_string());
}

#[tokio::test]
async fn identifier_matches_case_insensitively() {
    let app = router(state(seeded_store().await));

    let (status, body) = get(app, "/betas/IPHONE10,3").await;

    assert_eq!(status, StatusCode::OK);
    let records: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn unknown_device_is_404_with_json_error() {
    let app = router(state(seeded_store().await));

    let (status, body) = get(app, "/betas/iPad7,1").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains("iPad7,1"));
}

#[tokio::test]
async fn health_reports_record_count_without_refresh_loop() {
    let app = router(state(seeded_store().await));

    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.stored_records, Some(3));
    assert!(health.refresh_state.is_none());
    assert!(health.last_cycle.is_none());
    assert_eq!(health.adapters.len(), 1);
    assert_eq!(health.adapters[0].name, "sqlite");
    assert_eq!(health.adapters[0].kind, AdapterType::Storage);
    assert_eq!(health.adapters[0].status, "healthy");
}

#[tokio::test]
async fn health_is_unhealthy_when_store_is_not_open() {
    let store = Arc::new(SqliteStore::new(StorageConfig::default()));
    let app = router(state(store));

    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "unhealthy");
    assert!(health.stored_records.is_none());
    assert_eq!(health.adapters[0].status, "unhealthy");
    assert_eq!(health.adapters[0].detail.as_deref(), Some("store not initialized"));
}

#[tokio::test]
async fn health_lists_wired_adapters_and_degrades_on_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("betas.json");
    std::fs::write(&present, "[]").unwrap();

    let mut gateway = state(seeded_store().await);
    gateway.health.adapters = vec![Arc::new(FileSource::new(&present)) as Arc<dyn PluginAdapter>];
    let (_, body) = get(router(gateway.clone()), "/health").await;
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    let names: Vec<&str> = health.adapters.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["sqlite", "json-file"]);
    assert_eq!(health.adapters[1].kind, AdapterType::Source);

    let missing = FileSource::new(dir.path().join("missing.json"));
    gateway.health.adapters = vec![Arc::new(missing) as Arc<dyn PluginAdapter>];
    let (_, body) = get(router(gateway), "/health").await;
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "degraded");
    assert_eq!(health.adapters[1].status, "degraded");
    assert!(health.adapters[1].detail.as_deref().unwrap().contains("missing.json"));
}

#[tokio::test]
async fn store_failure_on_lookup_is_500() {
    let store = Arc::new(SqliteStore::new(StorageConfig::default()));
    let app = router(state(store));

    let (status, _) = get(app, "/betas/iPhone10,3").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn metrics_are_404_when_disabled() {
    let app = router(state(seeded_store().await));

    let (status, _) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_render_when_enabled() {
    let mut gateway = state(seeded_store().await);
    gateway.health.prometheus_render =
        Some(Arc::new(|| "betasign_checks_total 3\n".to_string()));
    gateway.health.limiter = Some(ConcurrencyLimiter::new(4));
    let app = router(gateway);

    let (status, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "betasign_checks_total 3\n");
}
