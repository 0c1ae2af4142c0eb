// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the resolution pipeline, storage, and lookup service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::Display;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    /// `healthy`, `degraded`, or `unhealthy`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded(_) => "degraded",
            Self::Unhealthy(_) => "unhealthy",
        }
    }

    /// The reason attached to a non-healthy status.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Healthy => None,
            Self::Degraded(detail) | Self::Unhealthy(detail) => Some(detail),
        }
    }
}

/// Identifies the kind of adapter behind a trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    Source,
    Catalog,
    Storage,
    Observability,
}

/// A firmware image listed by the external catalog.
///
/// Serialized with the field names of the public feed format
/// (`buildid`, `devices`, `url`, `filesize`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareCandidate {
    /// Marketing version, e.g. `15.0 beta 2`.
    pub version: String,
    /// Build identifier, e.g. `19A5281j`.
    #[serde(rename = "buildid")]
    pub build_id: String,
    /// Device identifiers this image installs on, duplicates removed, order kept.
    #[serde(rename = "devices", deserialize_with = "deserialize_device_set")]
    pub device_identifiers: Vec<String>,
    /// Location of the firmware archive.
    #[serde(rename = "url")]
    pub download_url: String,
    /// Size of the firmware archive in bytes.
    #[serde(rename = "filesize")]
    pub file_size_bytes: u64,
}

impl FirmwareCandidate {
    pub fn new(
        version: impl Into<String>,
        build_id: impl Into<String>,
        devices: impl IntoIterator<Item = impl Into<String>>,
        download_url: impl Into<String>,
        file_size_bytes: u64,
    ) -> Self {
        Self {
            version: version.into(),
            build_id: build_id.into(),
            device_identifiers: dedup_ordered(devices.into_iter().map(Into::into)),
            download_url: download_url.into(),
            file_size_bytes,
        }
    }
}

fn dedup_ordered(devices: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for device in devices {
        if !out.iter().any(|d| d.eq_ignore_ascii_case(&device)) {
            out.push(device);
        }
    }
    out
}

fn deserialize_device_set<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(dedup_ordered(raw.into_iter()))
}

/// Hardware reference data for one device model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Product identifier, e.g. `iPhone10,3`.
    pub identifier: String,
    /// Board configuration, e.g. `D22AP`.
    pub board_config: String,
    pub chip_id: u64,
    pub board_id: u64,
}

/// Restore path a build identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestoreBehavior {
    /// Full wipe-and-install. The only behavior relevant to signing checks.
    Erase,
    /// Incremental update that preserves user data.
    Update,
    Other,
}

impl RestoreBehavior {
    /// Map the manifest's `RestoreBehavior` string. Unrecognized values become `Other`.
    pub fn from_manifest(value: &str) -> Self {
        match value {
            "Erase" => Self::Erase,
            "Update" => Self::Update,
            _ => Self::Other,
        }
    }
}

/// The cryptographic identity of one hardware variant inside a build manifest.
///
/// Transient: exists only while a single candidate/device pair is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildIdentity {
    pub board_config: String,
    pub restore_behavior: RestoreBehavior,
    pub chip_id: u64,
    pub board_id: u64,
    pub unique_build_id: Vec<u8>,
}

/// Outcome of asking the signing authority about one build identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SigningStatus {
    /// The authority issued a ticket.
    Signed,
    /// The authority answered and refused.
    Unsigned,
    /// No trustworthy answer. Never persisted.
    Unknown,
}

impl SigningStatus {
    /// The persisted `signed` flag, or `None` for [`SigningStatus::Unknown`].
    pub fn as_signed(self) -> Option<bool> {
        match self {
            Self::Signed => Some(true),
            Self::Unsigned => Some(false),
            Self::Unknown => None,
        }
    }
}

/// Persisted signing result for one (build, device) pair.
///
/// Serialized with the field names of the public lookup API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRecord {
    #[serde(rename = "buildid")]
    pub build_id: String,
    #[serde(rename = "device")]
    pub device_identifier: String,
    pub version: String,
    #[serde(rename = "url")]
    pub download_url: String,
    #[serde(rename = "filesize")]
    pub file_size_bytes: u64,
    pub signed: bool,
    pub checked_at: DateTime<Utc>,
}

impl SigningRecord {
    /// Build the record for `device` from the candidate it was listed in.
    pub fn from_candidate(
        candidate: &FirmwareCandidate,
        device: &str,
        signed: bool,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            build_id: candidate.build_id.clone(),
            device_identifier: device.to_string(),
            version: candidate.version.clone(),
            download_url: candidate.download_url.clone(),
            file_size_bytes: candidate.file_size_bytes,
            signed,
            checked_at,
        }
    }

    /// Whether this record was checked more than `age` before `now`.
    pub fn is_older_than(&self, age: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.checked_at > age
    }
}

/// Identity of a (build, device) pair, the unit of work in a refresh cycle.
///
/// Device comparison is case-insensitive, matching how the store keys records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub build_id: String,
    device: String,
}

impl PairKey {
    pub fn new(build_id: &str, device: &str) -> Self {
        Self {
            build_id: build_id.to_string(),
            device: device.to_ascii_lowercase(),
        }
    }

    /// Lower-cased device identifier.
    pub fn device(&self) -> &str {
        &self.device
    }
}

/// Why a pair produced no new record in a cycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A record already exists and re-verification is not due.
    AlreadyRecorded,
    /// The device catalog has no identity for the device.
    UnknownDevice,
    /// The device catalog could not be reached. Retried next cycle.
    CatalogUnavailable,
    /// Neither manifest strategy produced a document.
    ManifestNotFound,
    /// The manifest has no erase identity for the device's board.
    IdentityNotFound,
    /// The manifest could not be parsed.
    MalformedManifest,
    /// The signing authority gave no trustworthy answer.
    SigningUnknown,
    /// The store rejected a read or write.
    Store,
    /// The task resolving the pair panicked.
    TaskFailed,
}
