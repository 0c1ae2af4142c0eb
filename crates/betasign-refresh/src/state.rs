// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Refresh loop lifecycle states.

use serde::Serialize;
use strum::Display;

/// Where the refresh loop is in its cycle.
///
/// `Idle -> Fetching -> Resolving -> Committed -> Idle`. A failed candidate
/// fetch goes straight back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// Waiting for the next cycle.
    Idle,
    /// Pulling the candidate list from the source.
    Fetching,
    /// Pair tasks are running.
    Resolving,
    /// Every pair task of the cycle has finished.
    Committed,
}
