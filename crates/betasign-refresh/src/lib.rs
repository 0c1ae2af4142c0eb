// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic refresh of signing status for every candidate/device pair.
//!
//! A cycle fetches the candidate list, claims each pair not yet recorded,
//! resolves each candidate's manifest once, then checks and stores every
//! claimed pair concurrently. Outbound work is bounded by the shared
//! concurrency limiter, not by task count.

pub mod pipeline;
pub mod report;
pub mod runner;
pub mod state;

pub use pipeline::{ManifestFetcher, SigningCheck};
pub use report::CycleReport;
pub use runner::{RefreshHandle, RefreshLoop};
pub use state::RefreshState;
