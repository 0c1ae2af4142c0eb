// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device catalog trait: hardware reference data by device identifier.

use async_trait::async_trait;

use crate::error::BetasignError;
use crate::traits::adapter::PluginAdapter;
use crate::types::DeviceIdentity;

/// Resolves device identifiers to their board configuration and chip ids.
#[async_trait]
pub trait DeviceCatalog: PluginAdapter {
    /// Looks up `identifier`. `Ok(None)` means the catalog does not know the device.
    async fn lookup(&self, identifier: &str) -> Result<Option<DeviceIdentity>, BetasignError>;
}
