// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for betasign.
//!
//! Provides the error type, the domain types that flow through the
//! signing-status pipeline, and the adapter traits implemented by the
//! candidate sources, device catalog, and result store.

pub mod error;
pub mod traits;
pub mod types;

pub use error::BetasignError;
pub use types::{
    AdapterType, BuildIdentity, DeviceIdentity, FirmwareCandidate, HealthStatus, PairKey,
    RestoreBehavior, SigningRecord, SigningStatus, SkipReason,
};

pub use traits::{CandidateSource, DeviceCatalog, PluginAdapter, RecordStore};
