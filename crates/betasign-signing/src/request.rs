// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signing request construction.

use std::ops::Range;

use betasign_core::{BetasignError, BuildIdentity};
use plist::{Dictionary, Value};

/// Anti-replay nonce sent with every request.
///
/// Must stay non-zero: an all-zero `ApNonce` makes the authority report
/// unsigned builds as signed. If the authority changes that behavior,
/// every stored result becomes suspect.
pub const AP_NONCE: [u8; 20] = [
    0x8b, 0x2e, 0x7c, 0x11, 0x5d, 0xa0, 0x43, 0xf9, 0x06, 0xce, 0x91, 0x3a, 0x7f, 0x58, 0xe2,
    0x14, 0xb7, 0x69, 0x0d, 0xc3,
];

/// Secondary nonce for modern tickets.
pub const SEP_NONCE: [u8; 20] = [0; 20];

/// Chip ids that predate personalized image4 tickets.
pub const LEGACY_CHIP_IDS: Range<u64> = 0x8900..0x8960;

const SECURITY_DOMAIN: u64 = 1;
const HOST_PLATFORM: &str = "mac";
const VERSION_INFO: &str = "libauthinstall-850.0.2";

/// Ticket flavor, decided once from the chip id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    /// 32-bit devices: `@APTicket`.
    Legacy,
    /// Everything else: `@ApImg4Ticket`, `ApSecurityMode` and `SepNonce`.
    Modern,
}

impl TicketKind {
    pub fn for_chip(chip_id: u64) -> Self {
        if LEGACY_CHIP_IDS.contains(&chip_id) {
            Self::Legacy
        } else {
            Self::Modern
        }
    }
}

/// A request asking whether one build identity is being signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub chip_id: u64,
    pub board_id: u64,
    pub unique_build_id: Vec<u8>,
    pub ticket: TicketKind,
    request_id: String,
}

impl SigningRequest {
    pub fn new(identity: &BuildIdentity) -> Self {
        Self {
            chip_id: identity.chip_id,
            board_id: identity.board_id,
            unique_build_id: identity.unique_build_id.clone(),
            ticket: TicketKind::for_chip(identity.chip_id),
            request_id: uuid::Uuid::new_v4().to_string().to_uppercase(),
        }
    }

    /// The request as a property-list dictionary.
    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("@HostPlatformInfo".into(), Value::String(HOST_PLATFORM.into()));
        dict.insert("@VersionInfo".into(), Value::String(VERSION_INFO.into()));
        dict.insert("@UUID".into(), Value::String(self.request_id.clone()));
        dict.insert("ApChipID".into(), Value::Integer(self.chip_id.into()));
        dict.insert("ApBoardID".into(), Value::Integer(self.board_id.into()));
        dict.insert("ApNonce".into(), Value::Data(AP_NONCE.to_vec()));
        dict.insert(
            "ApSecurityDomain".into(),
            Value::Integer(SECURITY_DOMAIN.into()),
        );
        dict.insert("ApProductionMode".into(), Value::Boolean(true));
        dict.insert(
            "UniqueBuildID".into(),
            Value::Data(self.unique_build_id.clone()),
        );

        match self.ticket {
            TicketKind::Legacy => {
                dict.insert("@APTicket".into(), Value::Boolean(true));
            }
            TicketKind::Modern => {
                dict.insert("@ApImg4Ticket".into(), Value::Boolean(true));
                dict.insert("ApSecurityMode".into(), Value::Boolean(true));
                dict.insert("SepNonce".into(), Value::Data(SEP_NONCE.to_vec()));
            }
        }
        dict
    }

    /// Serialize as a binary property list.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BetasignError> {
        let mut out = Vec::new();
        Value::Dictionary(self.to_dictionary())
            .to_writer_binary(&mut out)
            .map_err(|e| BetasignError::Internal(format!("failed to encode signing request: {e}")))?;
        Ok(out)
    }
}
