// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory candidate source for deterministic testing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use betasign_core::{
    AdapterType, BetasignError, CandidateSource, FirmwareCandidate, HealthStatus, PluginAdapter,
};

/// A candidate source returning whatever list it currently holds.
///
/// The list can be replaced between cycles to simulate a growing catalog.
#[derive(Clone, Default)]
pub struct StaticSource {
    candidates: Arc<Mutex<Vec<FirmwareCandidate>>>,
    fetches: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new(candidates: Vec<FirmwareCandidate>) -> Self {
        Self {
            candidates: Arc::new(Mutex::new(candidates)),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the candidate list returned by later fetches.
    pub async fn set_candidates(&self, candidates: Vec<FirmwareCandidate>) {
        *self.candidates.lock().await = candidates;
    }

    /// Number of completed fetches.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for StaticSource {
    fn name(&self) -> &str {
        "static-source"
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
impl CandidateSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<FirmwareCandidate>, BetasignError> {
        let candidates = self.candidates.lock().await.clone();
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(candidates)
    }
}
