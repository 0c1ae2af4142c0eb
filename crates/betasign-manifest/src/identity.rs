// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build identity extraction from a build manifest.

use betasign_core::{BetasignError, BuildIdentity, RestoreBehavior};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BuildManifest {
    #[serde(rename = "BuildIdentities")]
    build_identities: Vec<RawIdentity>,
}

#[derive(Debug, Deserialize)]
struct RawIdentity {
    #[serde(rename = "ApChipID")]
    chip_id: Option<NumericId>,
    #[serde(rename = "ApBoardID")]
    board_id: Option<NumericId>,
    #[serde(rename = "UniqueBuildID")]
    unique_build_id: Option<plist::Data>,
    #[serde(rename = "Info", default)]
    info: IdentityInfo,
}

#[derive(Debug, Default, Deserialize)]
struct IdentityInfo {
    #[serde(rename = "DeviceClass")]
    device_class: Option<String>,
    #[serde(rename = "RestoreBehavior")]
    restore_behavior: Option<String>,
}

/// Chip and board ids appear as `"0x8015"` strings or as plain integers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumericId {
    Integer(u64),
    Text(String),
}

impl NumericId {
    fn value(&self, field: &str) -> Result<u64, BetasignError> {
        match self {
            Self::Integer(v) => Ok(*v),
            Self::Text(s) => {
                let s = s.trim();
                let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => s.parse(),
                };
                parsed.map_err(|_| BetasignError::malformed(format!("{field} `{s}` is not a number")))
            }
        }
    }
}

/// Select the erase identity for `board_config` from a manifest.
///
/// Accepts XML and binary property lists. The first identity whose
/// `Info.DeviceClass` equals `board_config` (ignoring case) and whose
/// `Info.RestoreBehavior` is `Erase` wins.
///
/// Returns [`BetasignError::MalformedData`] when the manifest does not parse or the
/// matching identity lacks an id, and [`BetasignError::NotFound`] when nothing matches.
pub fn extract_identity(manifest: &[u8], board_config: &str) -> Result<BuildIdentity, BetasignError> {
    let manifest: BuildManifest = plist::from_bytes(manifest)
        .map_err(|e| BetasignError::malformed(format!("build manifest: {e}")))?;

    let raw = manifest
        .build_identities
        .iter()
        .find(|identity| {
            identity
                .info
                .device_class
                .as_deref()
                .is_some_and(|class| class.eq_ignore_ascii_case(board_config))
                && identity.info.restore_behavior.as_deref().map(RestoreBehavior::from_manifest)
                    == Some(RestoreBehavior::Erase)
        })
        .ok_or_else(|| BetasignError::not_found(format!("erase identity for {board_config}")))?;

    let chip_id = raw
        .chip_id
        .as_ref()
        .ok_or_else(|| BetasignError::malformed("identity is missing ApChipID"))?
        .value("ApChipID")?;
    let board_id = raw
        .board_id
        .as_ref()
        .ok_or_else(|| BetasignError::malformed("identity is missing ApBoardID"))?
        .value("ApBoardID")?;
    let unique_build_id = raw
        .unique_build_id
        .clone()
        .ok_or_else(|| BetasignError::malformed("identity is missing UniqueBuildID"))?;

    Ok(BuildIdentity {
        board_config: raw.info.device_class.clone().unwrap_or_default(),
        restore_behavior: RestoreBehavior::Erase,
        chip_id,
        board_id,
        unique_build_id: unique_build_id.into(),
    })
}
