// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate source trait: where firmware candidates come from.

use async_trait::async_trait;

use crate::error::BetasignError;
use crate::traits::adapter::PluginAdapter;
use crate::types::FirmwareCandidate;

/// Produces the finite set of firmware candidates for one refresh cycle.
///
/// Polled once per cycle. New items may appear between polls and
/// previously seen items may repeat identically; no ordering is assumed.
#[async_trait]
pub trait CandidateSource: PluginAdapter {
    /// Fetches the full candidate sequence.
    async fn fetch(&self) -> Result<Vec<FirmwareCandidate>, BetasignError>;
}
