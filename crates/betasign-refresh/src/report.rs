// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-cycle summary.

use std::collections::BTreeMap;

use betasign_core::{SigningStatus, SkipReason};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What happened to one claimed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PairOutcome {
    Recorded(SigningStatus),
    Invalidated,
    Skipped(SkipReason),
}

/// Summary of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: Option<DateTime<Utc>>,
    /// Candidates returned by the source.
    pub candidates: usize,
    /// Distinct (build, device) pairs seen.
    pub pairs_considered: usize,
    /// Pairs that entered the resolution pipeline.
    pub pairs_scheduled: usize,
    pub signed: usize,
    pub unsigned: usize,
    /// Stored records removed because a re-check found the identity gone.
    pub invalidated: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub elapsed_ms: u64,
}

impl CycleReport {
    /// Records written (inserted or replaced) this cycle.
    pub fn records_written(&self) -> usize {
        self.signed + self.unsigned
    }

    /// Pairs skipped for `reason`.
    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub(crate) fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_default() += 1;
    }

    pub(crate) fn apply(&mut self, outcome: PairOutcome) {
        match outcome {
            PairOutcome::Recorded(SigningStatus::Signed) => self.signed += 1,
            PairOutcome::Recorded(SigningStatus::Unsigned) => self.unsigned += 1,
            PairOutcome::Recorded(SigningStatus::Unknown) => self.skip(SkipReason::SigningUnknown),
            PairOutcome::Invalidated => self.invalidated += 1,
            PairOutcome::Skipped(reason) => self.skip(reason),
        }
    }
}
