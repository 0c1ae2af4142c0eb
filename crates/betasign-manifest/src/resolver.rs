// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-strategy build manifest resolution.
//!
//! 1. Sibling fetch: replace the last path segment of the download URL with
//!    the manifest file name and GET it. Holds a primary limiter slot.
//! 2. Archive read: open the download URL as a remote zip and read the first
//!    member matching the manifest pattern. Runs on a blocking worker under
//!    the archive limiter and never holds a primary slot.
//!
//! Each strategy retries transient failures. If both fail the manifest is
//! [`BetasignError::NotFound`].

use std::time::Duration;

use betasign_config::model::{ManifestConfig, NetworkConfig};
use betasign_core::BetasignError;
use betasign_resilience::{ConcurrencyLimiter, RetryPolicy};
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use crate::remote_zip;

/// Resolves a firmware download URL to its build manifest bytes.
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    client: reqwest::Client,
    filename: String,
    member_pattern: String,
    blocked_hosts: Vec<String>,
    limiter: ConcurrencyLimiter,
    archive_limiter: ConcurrencyLimiter,
    retry: RetryPolicy,
    request_timeout: Duration,
    connect_timeout: Duration,
    block_size: u64,
}

impl ManifestResolver {
    /// Creates a resolver sharing `limiter` with the other outbound clients.
    pub fn new(
        config: &ManifestConfig,
        network: &NetworkConfig,
        limiter: ConcurrencyLimiter,
        archive_limiter: ConcurrencyLimiter,
    ) -> Result<Self, BetasignError> {
        let request_timeout = Duration::from_secs(network.request_timeout_secs);
        let connect_timeout = Duration::from_secs(network.connect_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| BetasignError::Network {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            filename: config.filename.clone(),
            member_pattern: config.member_pattern.clone(),
            blocked_hosts: config
                .blocked_hosts
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            limiter,
            archive_limiter,
            retry: RetryPolicy::new(config.max_attempts)
                .with_delay(Duration::from_millis(network.retry_delay_ms)),
            request_timeout,
            connect_timeout,
            block_size: config.archive_block_size,
        })
    }

    /// Fetch the build manifest for the firmware at `download_url`.
    pub async fn resolve(&self, download_url: &str) -> Result<Vec<u8>, BetasignError> {
        let url = Url::parse(download_url)
            .map_err(|e| BetasignError::not_found(format!("manifest for `{download_url}`: {e}")))?;

        if let Some(host) = url.host_str()
            && self.blocked_hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
        {
            debug!(host, "download host requires authentication, skipping");
            return Err(BetasignError::not_found(format!(
                "manifest for {download_url}: host {host} is not publicly reachable"
            )));
        }

        match self.fetch_sibling(&url).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => debug!(url = %url, error = %e, "sibling manifest unavailable, trying archive"),
        }

        match self.fetch_from_archive(&url).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                warn!(url = %url, error = %e, "manifest not resolved");
                Err(BetasignError::not_found(format!("manifest for {download_url}")))
            }
        }
    }

    async fn fetch_sibling(&self, url: &Url) -> Result<Vec<u8>, BetasignError> {
        let sibling = url
            .join(&self.filename)
            .map_err(|e| BetasignError::not_found(format!("sibling of {url}: {e}")))?;

        self.retry
            .run("manifest.sibling", |attempt| {
                let sibling = sibling.clone();
                async move {
                    let _permit = self.limiter.acquire().await?;
                    debug!(url = %sibling, attempt, "fetching sibling manifest");
                    let response = self
                        .client
                        .get(sibling.clone())
                        .send()
                        .await
                        .map_err(|e| self.request_error(e))?;

                    let status = response.status();
                    if !status.is_success() {
                        return Err(status_error(status, &sibling));
                    }
                    let body = response.bytes().await.map_err(|e| self.request_error(e))?;
                    Ok(body.to_vec())
                }
            })
            .await
    }

    async fn fetch_from_archive(&self, url: &Url) -> Result<Vec<u8>, BetasignError> {
        self.retry
            .run("manifest.archive", |attempt| {
                let url = url.clone();
                let pattern = self.member_pattern.clone();
                let (timeout, connect_timeout, block_size) =
                    (self.request_timeout, self.connect_timeout, self.block_size);
                async move {
                    let _permit = self.archive_limiter.acquire().await?;
                    debug!(url = %url, attempt, "reading manifest from archive");
                    tokio::task::spawn_blocking(move || {
                        let client = reqwest::blocking::Client::builder()
                            .timeout(timeout)
                            .connect_timeout(connect_timeout)
                            .build()
                            .map_err(|e| BetasignError::Network {
                                message: format!("failed to build HTTP client: {e}"),
                                source: Some(Box::new(e)),
                            })?;
                        remote_zip::read_member(client, url, &pattern, block_size)
                    })
                    .await
                    .map_err(|e| BetasignError::Internal(format!("archive worker failed: {e}")))?
                }
            })
            .await
    }

    fn request_error(&self, e: reqwest::Error) -> BetasignError {
        if e.is_timeout() {
            BetasignError::Timeout {
                duration: self.request_timeout,
            }
        } else {
            BetasignError::Network {
                message: format!("manifest request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }
}

fn status_error(status: StatusCode, url: &Url) -> BetasignError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        BetasignError::network(format!("{url}: HTTP {status}"))
    } else {
        BetasignError::not_found(format!("{url}: HTTP {status}"))
    }
}
