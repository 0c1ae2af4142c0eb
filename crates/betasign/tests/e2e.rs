// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end refresh cycles against mocked feed, catalog, firmware host,
//! and signing authority.
//!
//! Each test gets its own mock server and temp database.

use std::sync::Arc;

use betasign::app;
use betasign_config::BetasignConfig;
use betasign_core::{RecordStore, SkipReason};
use betasign_storage::SqliteStore;
use betasign_test_utils::{ManifestBuilder, RangeResponder, zip_archive};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNED_BODY: &str = "STATUS=0&MESSAGE=SUCCESS&REQUEST_STRING=<plist/>";
const UNSIGNED_BODY: &str = "STATUS=94&MESSAGE=This device isn't eligible for the requested build.";

struct Harness {
    server: MockServer,
    config: BetasignConfig,
    _dir: TempDir,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        let mut config = BetasignConfig::default();
        config.storage.database_path = dir.path().join("betas.db").display().to_string();
        config.source.feed_url = Some(format!("{}/betas.json", server.uri()));
        config.catalog.base_url = server.uri();
        config.signing.endpoint = format!("{}/TSS/controller", server.uri());
        config.signing.max_attempts = 2;
        config.manifest.max_attempts = 2;
        config.network.request_timeout_secs = 5;

        Self {
            server,
            config,
            _dir: dir,
        }
    }

    async fn feed(&self, builds: &[(&str, &[&str])]) {
        let entries: Vec<_> = builds
            .iter()
            .map(|(build, devices)| {
                json!({
                    "version": format!("15.0 beta ({build})"),
                    "buildid": build,
                    "devices": devices,
                    "url": format!("{}/fw/{build}/Restore.ipsw", self.server.uri()),
                    "filesize": 5_798_394_520u64,
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/betas.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(entries))
            .mount(&self.server)
            .await;
    }

    async fn device(&self, identifier: &str, board_config: &str, cpid: u64, bdid: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/device/{identifier}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": identifier,
                "boards": [{"boardconfig": board_config, "cpid": cpid, "bdid": bdid}],
            })))
            .mount(&self.server)
            .await;
    }

    async fn sibling_manifest(&self, build: &str, manifest: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/fw/{build}/BuildManifest.plist")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(manifest))
            .mount(&self.server)
            .await;
    }

    async fn authority(&self, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/TSS/controller"))
            .and(query_param("action", "2"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    async fn store(&self) -> Arc<SqliteStore> {
        app::open_store(&self.config).await.unwrap()
    }

    async fn requests_to(&self, wanted: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == wanted)
            .count()
    }
}

fn manifest() -> Vec<u8> {
    ManifestBuilder::new()
        .identity("d22ap", "Erase", 0x8015, 0x06, &[0x11; 20])
        .identity("d22ap", "Update", 0x8015, 0x06, &[0x12; 20])
        .build_xml()
}

#[tokio::test(flavor = "multi_thread")]
async fn signed_build_is_recorded_and_second_cycle_is_a_no_op() {
    let harness = Harness::start().await;
    harness.feed(&[("19A5281j", &["iPhone10,3"])]).await;
    harness.device("iPhone10,3", "D22AP", 0x8015, 0x06).await;
    harness.sibling_manifest("19A5281j", manifest()).await;
    harness
        .authority(ResponseTemplate::new(200).set_body_string(SIGNED_BODY))
        .await;

    let store = harness.store().await;
    let built = app::build_refresh(&harness.config, store.clone()).unwrap();

    let first = built.refresh.run_cycle().await.unwrap();
    assert_eq!(first.signed, 1);
    let records = store.query("iphone10,3").await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].signed);
    assert_eq!(records[0].build_id, "19A5281j");

    let second = built.refresh.run_cycle().await.unwrap();
    assert_eq!(second.records_written(), 0);
    assert_eq!(second.skipped_for(SkipReason::AlreadyRecorded), 1);
    assert_eq!(harness.requests_to("/TSS/controller").await, 1);
    assert_eq!(harness.requests_to("/device/iPhone10,3").await, 1);
    assert!(built.limiter.peak() <= built.limiter.capacity());
}

#[tokio::test(flavor = "multi_thread")]
async fn refusal_is_recorded_as_unsigned() {
    let harness = Harness::start().await;
    harness.feed(&[("19A5281j", &["iPhone10,3"])]).await;
    harness.device("iPhone10,3", "D22AP", 0x8015, 0x06).await;
    harness.sibling_manifest("19A5281j", manifest()).await;
    harness
        .authority(ResponseTemplate::new(200).set_body_string(UNSIGNED_BODY))
        .await;

    let store = harness.store().await;
    let built = app::build_refresh(&harness.config, store.clone()).unwrap();
    let report = built.refresh.run_cycle().await.unwrap();

    assert_eq!(report.unsigned, 1);
    let record = store.get("19A5281j", "iPhone10,3").await.unwrap().unwrap();
    assert!(!record.signed);
}

#[tokio::test(flavor = "multi_thread")]
async fn authority_outage_leaves_store_untouched() {
    let harness = Harness::start().await;
    harness.feed(&[("19A5281j", &["iPhone10,3"])]).await;
    harness.device("iPhone10,3", "D22AP", 0x8015, 0x06).await;
    harness.sibling_manifest("19A5281j", manifest()).await;
    harness.authority(ResponseTemplate::new(503)).await;

    let store = harness.store().await;
    let built = app::build_refresh(&harness.config, store.clone()).unwrap();
    let report = built.refresh.run_cycle().await.unwrap();

    assert_eq!(report.skipped_for(SkipReason::SigningUnknown), 1);
    assert_eq!(store.count().await.unwrap(), 0);
    // Retried up to the configured attempt count.
    assert_eq!(harness.requests_to("/TSS/controller").await, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn manifest_is_read_from_archive_when_sibling_is_missing() {
    let harness = Harness::start().await;
    harness.feed(&[("19A5281j", &["iPhone10,3"])]).await;
    harness.device("iPhone10,3", "D22AP", 0x8015, 0x06).await;
    let archive = zip_archive(&[
        ("Restore.plist", b"<plist/>".as_slice()),
        ("BuildManifest.plist", manifest().as_slice()),
    ]);
    Mock::given(method("GET"))
        .and(path("/fw/19A5281j/Restore.ipsw"))
        .respond_with(RangeResponder::new(archive))
        .mount(&harness.server)
        .await;
    harness
        .authority(ResponseTemplate::new(200).set_body_string(SIGNED_BODY))
        .await;

    let store = harness.store().await;
    let built = app::build_refresh(&harness.config, store.clone()).unwrap();
    let report = built.refresh.run_cycle().await.unwrap();

    assert_eq!(report.signed, 1);
    assert!(store.exists("19A5281j", "iPhone10,3").await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_manifest_skips_pair_and_cycle_completes() {
    let harness = Harness::start().await;
    harness
        .feed(&[("19A5281j", &["iPhone10,3"]), ("19A5339a", &["iPhone10,3"])])
        .await;
    harness.device("iPhone10,3", "D22AP", 0x8015, 0x06).await;
    harness.sibling_manifest("19A5339a", manifest()).await;
    harness
        .authority(ResponseTemplate::new(200).set_body_string(SIGNED_BODY))
        .await;

    let store = harness.store().await;
    let built = app::build_refresh(&harness.config, store.clone()).unwrap();
    let report = built.refresh.run_cycle().await.unwrap();

    assert_eq!(report.skipped_for(SkipReason::ManifestNotFound), 1);
    assert_eq!(report.signed, 1);
    let builds: Vec<String> = store
        .query("iPhone10,3")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.build_id)
        .collect();
    assert_eq!(builds, vec!["19A5339a"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn blocked_host_is_never_contacted() {
    let harness = Harness::start().await;
    let entries = json!([{
        "version": "15.0 beta 2",
        "buildid": "19A5281j",
        "devices": ["iPhone10,3"],
        "url": "https://developer.apple.com/services-account/download?path=/iOS/Restore.ipsw",
        "filesize": 1,
    }]);
    Mock::given(method("GET"))
        .and(path("/betas.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries))
        .mount(&harness.server)
        .await;
    harness.device("iPhone10,3", "D22AP", 0x8015, 0x06).await;

    let store = harness.store().await;
    let built = app::build_refresh(&harness.config, store.clone()).unwrap();
    let report = built.refresh.run_cycle().await.unwrap();

    assert_eq!(report.skipped_for(SkipReason::ManifestNotFound), 1);
    assert_eq!(harness.requests_to("/TSS/controller").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_feed_fails_the_cycle() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/betas.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&harness.server)
        .await;

    let store = harness.store().await;
    let built = app::build_refresh(&harness.config, store.clone()).unwrap();

    assert!(built.refresh.run_cycle().await.is_err());
    assert_eq!(store.count().await.unwrap(), 0);
}
