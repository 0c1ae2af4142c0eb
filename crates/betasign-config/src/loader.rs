// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./betasign.toml` > `~/.config/betasign/betasign.toml` >
//! `/etc/betasign/betasign.toml` with environment variable overrides via `BETASIGN_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::BetasignConfig;

/// Top-level sections, used to map `BETASIGN_SECTION_KEY` onto `section.key`.
const SECTIONS: &[&str] = &[
    "service",
    "storage",
    "refresh",
    "network",
    "signing",
    "manifest",
    "catalog",
    "source",
    "gateway",
    "prometheus",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/betasign/betasign.toml` (system-wide)
/// 3. `~/.config/betasign/betasign.toml` (user XDG config)
/// 4. `./betasign.toml` (local directory)
/// 5. `BETASIGN_*` environment variables
pub fn load_config() -> Result<BetasignConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<BetasignConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BetasignConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BetasignConfig, figment::Error> {
    tracing::debug!(path = %path.display(), "loading configuration file");
    Figment::new()
        .merge(Serialized::defaults(BetasignConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(BetasignConfig::default()))
        .merge(Toml::file("/etc/betasign/betasign.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("betasign/betasign.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("betasign.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider.
///
/// Only the leading section name is turned into a dot, so keys that contain
/// underscores survive: `BETASIGN_REFRESH_MAX_IN_FLIGHT` maps to
/// `refresh.max_in_flight`, not `refresh.max.in.flight`.
fn env_provider() -> Env {
    Env::prefixed("BETASIGN_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a prefix-stripped env var name onto a dotted, lowercased config path.
///
/// Figment hands over the name in its original case.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
