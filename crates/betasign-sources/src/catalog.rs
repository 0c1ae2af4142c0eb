// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP device catalog with process-lifetime memoization.
//!
//! Queries `GET {base}/device/{identifier}` and takes the first board of the
//! answer. Definitive answers, including "no such device", are cached for
//! the life of the process; transient failures are not. Concurrent lookups
//! of the same identifier share one request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use betasign_config::model::{CatalogConfig, NetworkConfig};
use betasign_core::{
    AdapterType, BetasignError, DeviceCatalog, DeviceIdentity, HealthStatus, PluginAdapter,
};
use betasign_resilience::{ConcurrencyLimiter, RetryPolicy};
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct DeviceResponse {
    #[serde(default)]
    boards: Vec<BoardResponse>,
}

#[derive(Debug, Deserialize)]
struct BoardResponse {
    boardconfig: String,
    cpid: u64,
    bdid: u64,
}

/// Device catalog backed by the public device API.
#[derive(Clone)]
pub struct HttpDeviceCatalog {
    client: reqwest::Client,
    base_url: String,
    limiter: ConcurrencyLimiter,
    retry: RetryPolicy,
    cache: Arc<DashMap<String, Arc<OnceCell<Option<DeviceIdentity>>>>>,
}

impl HttpDeviceCatalog {
    pub fn new(
        config: &CatalogConfig,
        network: &NetworkConfig,
        limiter: ConcurrencyLimiter,
    ) -> Result<Self, BetasignError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
            .build()
            .map_err(|e| BetasignError::Network {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter,
            retry: RetryPolicy::new(config.max_attempts)
                .with_delay(Duration::from_millis(network.retry_delay_ms)),
            cache: Arc::new(DashMap::new()),
        })
    }

    /// Number of identifiers with a settled answer.
    pub fn cached(&self) -> usize {
        self.cache
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<DeviceIdentity>, BetasignError> {
        let url = format!("{}/device/{identifier}", self.base_url);
        self.retry
            .run("catalog", |attempt| {
                let url = url.clone();
                async move {
                    let _permit = self.limiter.acquire().await?;
                    debug!(%url, attempt, "looking up device");
                    let response = self.client.get(&url).send().await.map_err(|e| {
                        BetasignError::Network {
                            message: format!("device lookup failed: {e}"),
                            source: Some(Box::new(e)),
                        }
                    })?;

                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        return Err(BetasignError::network(format!(
                            "device lookup returned HTTP {status}"
                        )));
                    }
                    if !status.is_success() {
                        return Ok(None);
                    }

                    let body: DeviceResponse = response.json().await.map_err(|e| {
                        BetasignError::malformed(format!("device response for {identifier}: {e}"))
                    })?;
                    Ok(body.boards.into_iter().next().map(|board| DeviceIdentity {
                        identifier: identifier.to_string(),
                        board_config: board.boardconfig,
                        chip_id: board.cpid,
                        board_id: board.bdid,
                    }))
                }
            })
            .await
    }
}

#[async_trait]
impl PluginAdapter for HttpDeviceCatalog {
    fn name(&self) -> &str {
        "http-device-catalog"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Catalog
    }

    async fn health_check(&self) -> Result<HealthStatus, BetasignError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BetasignError> {
        self.cache.clear();
        Ok(())
    }
}

#[async_trait]
impl DeviceCatalog for HttpDeviceCatalog {
    async fn lookup(&self, identifier: &str) -> Result<Option<DeviceIdentity>, BetasignError> {
        let cell = self
            .cache
            .entry(identifier.to_ascii_lowercase())
            .or_default()
            .clone();
        cell.get_or_try_init(|| self.fetch(identifier))
            .await
            .cloned()
    }
}
