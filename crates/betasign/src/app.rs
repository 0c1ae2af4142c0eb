// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembles stores, clients, and the refresh loop from configuration.

use std::sync::Arc;

use betasign_config::BetasignConfig;
use betasign_core::{BetasignError, CandidateSource, PluginAdapter, RecordStore};
use betasign_manifest::ManifestResolver;
use betasign_refresh::RefreshLoop;
use betasign_resilience::ConcurrencyLimiter;
use betasign_signing::SigningClient;
use betasign_sources::{FileSource, HttpDeviceCatalog, JsonFeedSource};
use betasign_storage::SqliteStore;
use tracing::{info, warn};

/// Open and migrate the configured result store.
pub async fn open_store(config: &BetasignConfig) -> Result<Arc<SqliteStore>, BetasignError> {
    let store = SqliteStore::new(config.storage.clone());
    store.initialize().await?;
    info!(path = %config.storage.database_path, "result store ready");
    Ok(Arc::new(store))
}

/// A candidate source, also held as a plain adapter for health and shutdown.
pub struct SelectedSource {
    pub source: Arc<dyn CandidateSource>,
    pub adapter: Arc<dyn PluginAdapter>,
}

impl SelectedSource {
    fn new<S: CandidateSource>(source: S) -> Self {
        let source = Arc::new(source);
        Self {
            source: source.clone(),
            adapter: source,
        }
    }
}

/// The configured candidate source. Exactly one of feed or file must be set.
pub fn candidate_source(config: &BetasignConfig) -> Result<SelectedSource, BetasignError> {
    match (&config.source.feed_url, &config.source.file_path) {
        (Some(url), None) => Ok(SelectedSource::new(JsonFeedSource::new(
            url.as_str(),
            &config.network,
        )?)),
        (None, Some(path)) => Ok(SelectedSource::new(FileSource::new(path.as_str()))),
        (Some(_), Some(_)) => Err(BetasignError::Config(
            "source.feed_url and source.file_path are mutually exclusive".into(),
        )),
        (None, None) => Err(BetasignError::Config(
            "no candidate source configured: set source.feed_url or source.file_path".into(),
        )),
    }
}

/// A refresh loop, the outbound limiter its clients share, and the
/// adapters it was wired from (store excluded).
pub struct RefreshApp {
    pub refresh: RefreshLoop,
    pub limiter: ConcurrencyLimiter,
    pub adapters: Vec<Arc<dyn PluginAdapter>>,
}

/// Wire the refresh loop over `store`.
///
/// One limiter bounds every catalog lookup, sibling manifest fetch, and
/// signing request. Archive reads get their own smaller limiter.
pub fn build_refresh(
    config: &BetasignConfig,
    store: Arc<dyn RecordStore>,
) -> Result<RefreshApp, BetasignError> {
    let limiter = ConcurrencyLimiter::new(config.refresh.max_in_flight);
    let archive_limiter = ConcurrencyLimiter::new(config.refresh.archive_concurrency);

    let SelectedSource { source, adapter } = candidate_source(config)?;
    let catalog = Arc::new(HttpDeviceCatalog::new(
        &config.catalog,
        &config.network,
        limiter.clone(),
    )?);
    let resolver = ManifestResolver::new(
        &config.manifest,
        &config.network,
        limiter.clone(),
        archive_limiter,
    )?;
    let signer = SigningClient::new(&config.signing, &config.network, limiter.clone())?;

    info!(
        source = source.name(),
        max_in_flight = limiter.capacity(),
        signing_endpoint = %signer.endpoint(),
        "refresh pipeline assembled"
    );

    let adapters: Vec<Arc<dyn PluginAdapter>> =
        vec![adapter, catalog.clone() as Arc<dyn PluginAdapter>];
    let refresh = RefreshLoop::new(
        &config.refresh,
        source,
        catalog,
        Arc::new(resolver),
        Arc::new(signer),
        store,
    );
    Ok(RefreshApp {
        refresh,
        limiter,
        adapters,
    })
}

/// Shut every adapter down, the store last. Failures are logged, and the
/// store's failure is returned.
pub async fn shutdown_adapters(
    store: &dyn RecordStore,
    adapters: &[Arc<dyn PluginAdapter>],
) -> Result<(), BetasignError> {
    for adapter in adapters {
        if let Err(e) = adapter.shutdown().await {
            warn!(adapter = adapter.name(), error = %e, "adapter shutdown failed");
        }
    }
    store.shutdown().await
}
