// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the RecordStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use betasign_config::model::StorageConfig;
use betasign_core::{
    AdapterType, BetasignError, HealthStatus, PluginAdapter, RecordStore, SigningRecord,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed result store.
///
/// Wraps a [`Database`] handle and delegates all operations to the typed
/// query module. The database is opened on the first call to
/// [`RecordStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store for the configured database. Nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Create a store over an already-open database.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    fn db(&self) -> Result<&Database, BetasignError> {
        self.db.get().ok_or_else(|| BetasignError::Storage {
            source: "store not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, BetasignError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("store not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BetasignError> {
        if self.db.initialized() {
            self.close().await?;
            debug!("shutdown: store flushed");
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn initialize(&self) -> Result<(), BetasignError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| BetasignError::Storage {
            source: "store already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), BetasignError> {
        self.db()?.close().await
    }

    async fn upsert(&self, record: &SigningRecord) -> Result<(), BetasignError> {
        queries::records::upsert_record(self.db()?, record).await
    }

    async fn exists(&self, build_id: &str, device: &str) -> Result<bool, BetasignError> {
        queries::records::record_exists(self.db()?, build_id, device).await
    }

    async fn get(
        &self,
        build_id: &str,
        device: &str,
    ) -> Result<Option<SigningRecord>, BetasignError> {
        queries::records::get_record(self.db()?, build_id, device).await
    }

    async fn delete(&self, build_id: &str, device: &str) -> Result<bool, BetasignError> {
        queries::records::delete_record(self.db()?, build_id, device).await
    }

    async fn query(&self, device: &str) -> Result<Vec<SigningRecord>, BetasignError> {
        queries::records::records_for_device(self.db()?, device).await
    }

    async fn count(&self) -> Result<u64, BetasignError> {
        queries::records::count_records(self.db()?).await
    }
}
