// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by sources, catalogs, and stores.

use async_trait::async_trait;

use crate::error::BetasignError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for every pluggable betasign adapter.
///
/// Provides identity, lifecycle, and health check capabilities so the
/// binary can report on whatever concrete adapters it wired together.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the kind of adapter.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, BetasignError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), BetasignError>;
}
