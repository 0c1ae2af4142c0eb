// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero capacities, absolute URLs, and mutually exclusive sources.

use crate::diagnostic::ConfigError;
use crate::model::BetasignConfig;

/// Smallest accepted range read for archive access.
const MIN_ARCHIVE_BLOCK_SIZE: u64 = 1024;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &BetasignConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(validation("storage.database_path must not be empty"));
    }

    if config.refresh.interval_secs == 0 {
        errors.push(validation("refresh.interval_secs must be at least 1"));
    }

    if config.refresh.max_in_flight == 0 {
        errors.push(validation("refresh.max_in_flight must be at least 1"));
    }

    if config.refresh.archive_concurrency == 0 {
        errors.push(validation("refresh.archive_concurrency must be at least 1"));
    }

    if config.refresh.recheck_after_secs == Some(0) {
        errors.push(validation(
            "refresh.recheck_after_secs must be at least 1 when set",
        ));
    }

    if config.network.request_timeout_secs == 0 {
        errors.push(validation("network.request_timeout_secs must be at least 1"));
    }

    for (key, attempts) in [
        ("signing.max_attempts", config.signing.max_attempts),
        ("manifest.max_attempts", config.manifest.max_attempts),
        ("catalog.max_attempts", config.catalog.max_attempts),
    ] {
        if attempts == 0 {
            errors.push(validation(format!("{key} must be at least 1")));
        }
    }

    for (key, url) in [
        ("signing.endpoint", Some(&config.signing.endpoint)),
        ("catalog.base_url", Some(&config.catalog.base_url)),
        ("source.feed_url", config.source.feed_url.as_ref()),
    ] {
        if let Some(url) = url
            && !is_http_url(url)
        {
            errors.push(validation(format!(
                "{key} `{url}` must be an absolute http(s) URL"
            )));
        }
    }

    if config.manifest.filename.trim().is_empty() || config.manifest.filename.contains('/') {
        errors.push(validation(
            "manifest.filename must be a bare, non-empty file name",
        ));
    }

    if config.manifest.archive_block_size < MIN_ARCHIVE_BLOCK_SIZE {
        errors.push(validation(format!(
            "manifest.archive_block_size must be at least {MIN_ARCHIVE_BLOCK_SIZE} bytes"
        )));
    }

    if config.manifest.member_pattern.trim().is_empty() {
        errors.push(validation("manifest.member_pattern must not be empty"));
    }

    if config.source.feed_url.is_some() && config.source.file_path.is_some() {
        errors.push(validation(
            "source.feed_url and source.file_path are mutually exclusive",
        ));
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(validation("gateway.host must not be empty"));
    } else {
        let host = config.gateway.host.trim();
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}
