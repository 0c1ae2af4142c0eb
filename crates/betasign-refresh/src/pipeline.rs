// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-candidate resolution: catalog, manifest, identity, check, upsert.
//!
//! The manifest is fetched once per candidate and shared by every pending
//! device of that candidate. Each device then runs its own
//! identity/check/upsert chain. A failure ends only its own pair.

use std::sync::Arc;

use async_trait::async_trait;
use betasign_core::{
    BetasignError, BuildIdentity, DeviceCatalog, DeviceIdentity, FirmwareCandidate, RecordStore,
    SigningRecord, SigningStatus, SkipReason,
};
use betasign_manifest::{ManifestResolver, extract_identity};
use betasign_signing::SigningClient;
use chrono::Utc;
use futures::future::join_all;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::report::PairOutcome;

/// Obtains build manifests for firmware download URLs.
#[async_trait]
pub trait ManifestFetcher: Send + Sync + 'static {
    async fn fetch_manifest(&self, download_url: &str) -> Result<Vec<u8>, BetasignError>;
}

/// Asks the signing authority about a build identity.
#[async_trait]
pub trait SigningCheck: Send + Sync + 'static {
    async fn check(&self, identity: &BuildIdentity) -> SigningStatus;
}

#[async_trait]
impl ManifestFetcher for ManifestResolver {
    async fn fetch_manifest(&self, download_url: &str) -> Result<Vec<u8>, BetasignError> {
        self.resolve(download_url).await
    }
}

#[async_trait]
impl SigningCheck for SigningClient {
    async fn check(&self, identity: &BuildIdentity) -> SigningStatus {
        SigningClient::check(self, identity).await
    }
}

/// A claimed pair waiting for resolution.
#[derive(Debug, Clone)]
pub(crate) struct PendingPair {
    pub device: String,
    /// A stored record exists and is being re-verified.
    pub recheck: bool,
}

/// Collaborators shared by every pair task of a cycle.
#[derive(Clone)]
pub(crate) struct Stages {
    pub catalog: Arc<dyn DeviceCatalog>,
    pub manifests: Arc<dyn ManifestFetcher>,
    pub signer: Arc<dyn SigningCheck>,
    pub store: Arc<dyn RecordStore>,
}

impl Stages {
    /// Resolve every pending device of one candidate.
    pub async fn resolve_candidate(
        &self,
        candidate: Arc<FirmwareCandidate>,
        pending: Vec<PendingPair>,
    ) -> Vec<PairOutcome> {
        let mut outcomes = Vec::with_capacity(pending.len());

        let lookups = join_all(pending.iter().map(|p| self.catalog.lookup(&p.device))).await;
        let mut resolvable: Vec<(PendingPair, DeviceIdentity)> = Vec::new();
        for (pair, lookup) in pending.into_iter().zip(lookups) {
            match lookup {
                Ok(Some(device)) => resolvable.push((pair, device)),
                Ok(None) => {
                    debug!(device = %pair.device, "device not in catalog");
                    outcomes.push(PairOutcome::Skipped(SkipReason::UnknownDevice));
                }
                Err(e) => {
                    warn!(device = %pair.device, error = %e, "device lookup failed");
                    outcomes.push(PairOutcome::Skipped(SkipReason::CatalogUnavailable));
                }
            }
        }
        if resolvable.is_empty() {
            return outcomes;
        }

        let manifest = match self.manifests.fetch_manifest(&candidate.download_url).await {
            Ok(bytes) => Arc::new(bytes),
            Err(e) => {
                debug!(build_id = %candidate.build_id, error = %e, "manifest unavailable");
                outcomes.extend(
                    resolvable
                        .iter()
                        .map(|_| PairOutcome::Skipped(SkipReason::ManifestNotFound)),
                );
                return outcomes;
            }
        };

        let mut tasks = JoinSet::new();
        for (pair, device) in resolvable {
            let stages = self.clone();
            let candidate = Arc::clone(&candidate);
            let manifest = Arc::clone(&manifest);
            tasks.spawn(async move {
                stages
                    .resolve_pair(&candidate, &manifest, pair, device)
                    .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(build_id = %candidate.build_id, error = %e, "pair task failed");
                    outcomes.push(PairOutcome::Skipped(SkipReason::TaskFailed));
                }
            }
        }
        outcomes
    }

    async fn resolve_pair(
        &self,
        candidate: &FirmwareCandidate,
        manifest: &[u8],
        pair: PendingPair,
        device: DeviceIdentity,
    ) -> PairOutcome {
        let identity = match extract_identity(manifest, &device.board_config) {
            Ok(identity) => identity,
            Err(BetasignError::NotFound { .. }) => {
                return self
                    .give_up(candidate, &pair, SkipReason::IdentityNotFound)
                    .await;
            }
            Err(e) => {
                warn!(build_id = %candidate.build_id, device = %pair.device, error = %e, "malformed manifest");
                return self
                    .give_up(candidate, &pair, SkipReason::MalformedManifest)
                    .await;
            }
        };

        let status = self.signer.check(&identity).await;
        betasign_prometheus::record_check(status);

        let Some(signed) = status.as_signed() else {
            debug!(build_id = %candidate.build_id, device = %pair.device, "signing status unknown");
            return PairOutcome::Skipped(SkipReason::SigningUnknown);
        };

        let record = SigningRecord::from_candidate(candidate, &pair.device, signed, Utc::now());
        match self.store.upsert(&record).await {
            Ok(()) => {
                debug!(build_id = %candidate.build_id, device = %pair.device, %status, "recorded");
                PairOutcome::Recorded(status)
            }
            Err(e) => {
                error!(build_id = %candidate.build_id, device = %pair.device, error = %e, "store write failed");
                PairOutcome::Skipped(SkipReason::Store)
            }
        }
    }

    /// Skip the pair, dropping its stored record if this was a re-check.
    async fn give_up(
        &self,
        candidate: &FirmwareCandidate,
        pair: &PendingPair,
        reason: SkipReason,
    ) -> PairOutcome {
        if !pair.recheck {
            return PairOutcome::Skipped(reason);
        }
        match self.store.delete(&candidate.build_id, &pair.device).await {
            Ok(true) => {
                debug!(build_id = %candidate.build_id, device = %pair.device, %reason, "record invalidated");
                PairOutcome::Invalidated
            }
            Ok(false) => PairOutcome::Skipped(reason),
            Err(e) => {
                error!(build_id = %candidate.build_id, device = %pair.device, error = %e, "store delete failed");
                PairOutcome::Skipped(SkipReason::Store)
            }
        }
    }
}
