// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON candidate feed fetched over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use betasign_config::model::NetworkConfig;
use betasign_core::{
    AdapterType, BetasignError, CandidateSource, FirmwareCandidate, HealthStatus, PluginAdapter,
};
use betasign_resilience::RetryPolicy;
use reqwest::StatusCode;
use tracing::{debug, warn};

/// Parse a candidate feed document.
///
/// The document must be a JSON array. Entries that do not deserialize as a
/// [`FirmwareCandidate`] are skipped with a warning.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FirmwareCandidate>, BetasignError> {
    let entries: Vec<serde_json::Value> = serde_json::from_slice(bytes)
        .map_err(|e| BetasignError::malformed(format!("candidate feed is not a JSON array: {e}")))?;

    let total = entries.len();
    let candidates: Vec<FirmwareCandidate> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed feed entry");
                None
            }
        })
        .collect();
    debug!(total, accepted = candidates.len(), "parsed candidate feed");
    Ok(candidates)
}

/// Candidate source backed by an HTTP JSON feed.
pub struct JsonFeedSource {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl JsonFeedSource {
    pub fn new(url: impl Into<String>, network: &NetworkConfig) -> Result<Self, BetasignError> {
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
            url: url.into(),
            retry: RetryPolicy::default()
                .with_delay(Duration::from_millis(network.retry_delay_ms)),
        })
    }

    async fn download(&self) -> Result<Vec<u8>, BetasignError> {
        self.retry
            .run("feed", |_| async move {
                let response = self.client.get(&self.url).send().await.map_err(|e| {
                    BetasignError::Network {
                        message: format!("feed request failed: {e}"),
                        source: Some(Box::new(e)),
                    }
                })?;
                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    return Err(BetasignError::network(format!("feed returned HTTP {status}")));
                }
                if !status.is_success() {
                    return Err(BetasignError::not_found(format!(
                        "feed {} returned HTTP {status}",
                        self.url
                    )));
                }
                let body = response.bytes().await.map_err(|e| BetasignError::Network {
                    message: format!("feed body read failed: {e}"),
                    source: Some(Box::new(e)),
                })?;
                Ok(body.to_vec())
            })
            .await
    }
}

#[async_trait]
impl PluginAdapter for JsonFeedSource {
    fn name(&self) -> &str {
        "json-feed"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, BetasignError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BetasignError> {
        Ok(())
    }
}

#[async_trait]
impl CandidateSource for JsonFeedSource {
    async fn fetch(&self) -> Result<Vec<FirmwareCandidate>, BetasignError> {
        let body = self.download().await?;
        parse_feed(&body)
    }
}
