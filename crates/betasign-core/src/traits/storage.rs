// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result store trait for persisted signing records.

use async_trait::async_trait;

use crate::error::BetasignError;
use crate::traits::adapter::PluginAdapter;
use crate::types::SigningRecord;

/// Idempotent cache of signing records keyed by (build id, device identifier).
///
/// Device identifiers compare case-insensitively. `upsert` and `delete` are
/// atomic per key, so callers never need external locking.
#[async_trait]
pub trait RecordStore: PluginAdapter {
    /// Initializes the backend (connection, migrations).
    async fn initialize(&self) -> Result<(), BetasignError>;

    /// Flushes pending writes and releases the backend.
    async fn close(&self) -> Result<(), BetasignError>;

    /// Inserts the record, or replaces the existing record for the same key.
    async fn upsert(&self, record: &SigningRecord) -> Result<(), BetasignError>;

    /// Whether a record exists for the pair.
    async fn exists(&self, build_id: &str, device: &str) -> Result<bool, BetasignError>;

    /// Fetches the record for the pair, if any.
    async fn get(
        &self,
        build_id: &str,
        device: &str,
    ) -> Result<Option<SigningRecord>, BetasignError>;

    /// Removes the record for the pair. Returns whether a record was removed.
    async fn delete(&self, build_id: &str, device: &str) -> Result<bool, BetasignError>;

    /// All records for a device, sorted by build id descending.
    async fn query(&self, device: &str) -> Result<Vec<SigningRecord>, BetasignError>;

    /// Total number of stored records.
    async fn count(&self) -> Result<u64, BetasignError>;
}
