// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for betasign.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level betasign configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BetasignConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Result store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Refresh loop cadence and concurrency.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Shared HTTP client settings.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Signing authority endpoint settings.
    #[serde(default)]
    pub signing: SigningConfig,

    /// Build manifest resolution settings.
    #[serde(default)]
    pub manifest: ManifestConfig,

    /// Device catalog settings.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Candidate source selection.
    #[serde(default)]
    pub source: SourceConfig,

    /// Lookup service settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs and the health endpoint.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "betasign".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Result store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("betasign").join("betas.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("betas.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Refresh loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Seconds to sleep after a committed cycle before starting the next one.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Capacity of the process-wide outbound request limiter.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Capacity of the separate limiter for remote archive reads.
    #[serde(default = "default_archive_concurrency")]
    pub archive_concurrency: usize,

    /// Re-check pairs whose stored record is older than this many seconds.
    /// `None` disables re-verification: a stored pair is never checked again.
    #[serde(default)]
    pub recheck_after_secs: Option<u64>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_in_flight: default_max_in_flight(),
            archive_concurrency: default_archive_concurrency(),
            recheck_after_secs: None,
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_max_in_flight() -> usize {
    100
}

fn default_archive_concurrency() -> usize {
    8
}

/// Shared HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// Whole-request timeout in seconds. Expiry counts as a transient failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Pause in milliseconds before each retry of a transient failure.
    #[serde(default)]
    pub retry_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_delay_ms: 0,
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Signing authority configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    /// Endpoint receiving signing requests. The `action=2` query is appended.
    #[serde(default = "default_signing_endpoint")]
    pub endpoint: String,

    /// User-Agent header sent with every signing request.
    #[serde(default = "default_signing_user_agent")]
    pub user_agent: String,

    /// Attempts per signing request before the answer is `unknown`.
    #[serde(default = "default_signing_attempts")]
    pub max_attempts: u32,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            endpoint: default_signing_endpoint(),
            user_agent: default_signing_user_agent(),
            max_attempts: default_signing_attempts(),
        }
    }
}

fn default_signing_endpoint() -> String {
    "https://gs.apple.com/TSS/controller".to_string()
}

fn default_signing_user_agent() -> String {
    "InetURL/1.0".to_string()
}

fn default_signing_attempts() -> u32 {
    3
}

/// Build manifest resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestConfig {
    /// File name fetched next to the firmware archive.
    #[serde(default = "default_manifest_filename")]
    pub filename: String,

    /// Substring identifying the manifest member inside the archive.
    #[serde(default = "default_member_pattern")]
    pub member_pattern: String,

    /// Attempts per strategy on transient failures.
    #[serde(default = "default_manifest_attempts")]
    pub max_attempts: u32,

    /// Hosts whose downloads require authentication and are never fetched.
    #[serde(default = "default_blocked_hosts")]
    pub blocked_hosts: Vec<String>,

    /// Bytes fetched per range request when reading inside an archive.
    #[serde(default = "default_archive_block_size")]
    pub archive_block_size: u64,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            filename: default_manifest_filename(),
            member_pattern: default_member_pattern(),
            max_attempts: default_manifest_attempts(),
            blocked_hosts: default_blocked_hosts(),
            archive_block_size: default_archive_block_size(),
        }
    }
}

fn default_manifest_filename() -> String {
    "BuildManifest.plist".to_string()
}

fn default_member_pattern() -> String {
    "BuildManifest".to_string()
}

fn default_manifest_attempts() -> u32 {
    5
}

fn default_archive_block_size() -> u64 {
    256 * 1024
}

fn default_blocked_hosts() -> Vec<String> {
    vec![
        "developer.apple.com".to_string(),
        "adcdownload.apple.com".to_string(),
    ]
}

/// Device catalog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Base URL of the device API; `/device/{identifier}` is appended.
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,

    /// Attempts per device lookup on transient failures.
    #[serde(default = "default_catalog_attempts")]
    pub max_attempts: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            max_attempts: default_catalog_attempts(),
        }
    }
}

fn default_catalog_base_url() -> String {
    "https://api.ipsw.me/v4".to_string()
}

fn default_catalog_attempts() -> u32 {
    3
}

/// Candidate source configuration. At most one of the two may be set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// URL of a JSON candidate feed.
    #[serde(default)]
    pub feed_url: Option<String>,

    /// Path to a JSON candidate file.
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Lookup service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Serve the lookup API alongside the refresh loop.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    5000
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
