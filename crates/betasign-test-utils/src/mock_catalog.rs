// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory device catalog for deterministic testing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use betasign_core::{
    AdapterType, BetasignError, DeviceCatalog, DeviceIdentity, HealthStatus, PluginAdapter,
};

/// A device catalog backed by a fixed map. Identifier matching ignores case.
#[derive(Clone, Default)]
pub struct StaticCatalog {
    devices: Arc<HashMap<String, DeviceIdentity>>,
    outages: Arc<Mutex<HashSet<String>>>,
    lookups: Arc<AtomicUsize>,
}

impl StaticCatalog {
    pub fn new(devices: impl IntoIterator<Item = DeviceIdentity>) -> Self {
        Self {
            devices: Arc::new(
                devices
                    .into_iter()
                    .map(|d| (d.identifier.to_ascii_lowercase(), d))
                    .collect(),
            ),
            outages: Arc::default(),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make lookups of `identifier` fail with a transient network error.
    pub fn set_unavailable(&self, identifier: &str) {
        self.outages
            .lock()
            .expect("outage set poisoned")
            .insert(identifier.to_ascii_lowercase());
    }

    /// Number of lookups served.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

/// Shorthand for a catalog entry.
pub fn device(identifier: &str, board_config: &str, chip_id: u64, board_id: u64) -> DeviceIdentity {
    DeviceIdentity {
        identifier: identifier.to_string(),
        board_config: board_config.to_string(),
        chip_id,
        board_id,
    }
}

#[async_trait]
impl PluginAdapter for StaticCatalog {
    fn name(&self) -> &str {
        "static-catalog"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Catalog
    }

    async fn health_check(&self) -> Result<HealthStatus, BetasignError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BetasignError> {
        Ok(())
    }
}

#[async_trait]
impl DeviceCatalog for StaticCatalog {
    async fn lookup(&self, identifier: &str) -> Result<Option<DeviceIdentity>, BetasignError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let key = identifier.to_ascii_lowercase();
        if self.outages.lock().expect("outage set poisoned").contains(&key) {
            return Err(BetasignError::network(format!("catalog unavailable for {identifier}")));
        }
        Ok(self.devices.get(&key).cloned())
    }
}
