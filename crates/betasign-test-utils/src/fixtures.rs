// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixture builders for manifests, archives, and candidates.

use std::io::{Cursor, Write};

use betasign_core::FirmwareCandidate;
use plist::{Dictionary, Value};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Builds a `BuildManifest.plist` document with the given identities.
#[derive(Debug, Default, Clone)]
pub struct ManifestBuilder {
    identities: Vec<Value>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity whose chip and board ids are hex strings, as vendor manifests carry them.
    pub fn identity(
        self,
        device_class: &str,
        restore_behavior: &str,
        chip_id: u64,
        board_id: u64,
        unique_build_id: &[u8],
    ) -> Self {
        self.push(
            device_class,
            restore_behavior,
            Some(Value::String(format!("{chip_id:#x}"))),
            Some(Value::String(format!("{board_id:#x}"))),
            Some(unique_build_id),
        )
    }

    /// Add an identity whose chip and board ids are plist integers.
    pub fn identity_with_integer_ids(
        self,
        device_class: &str,
        restore_behavior: &str,
        chip_id: u64,
        board_id: u64,
        unique_build_id: &[u8],
    ) -> Self {
        self.push(
            device_class,
            restore_behavior,
            Some(Value::Integer(chip_id.into())),
            Some(Value::Integer(board_id.into())),
            Some(unique_build_id),
        )
    }

    /// Add an identity carrying only its `Info` dictionary.
    pub fn identity_without_ids(self, device_class: &str, restore_behavior: &str) -> Self {
        self.push(device_class, restore_behavior, None, None, None)
    }

    fn push(
        mut self,
        device_class: &str,
        restore_behavior: &str,
        chip_id: Option<Value>,
        board_id: Option<Value>,
        unique_build_id: Option<&[u8]>,
    ) -> Self {
        let mut info = Dictionary::new();
        info.insert("DeviceClass".into(), Value::String(device_class.into()));
        info.insert(
            "RestoreBehavior".into(),
            Value::String(restore_behavior.into()),
        );
        info.insert("Variant".into(), Value::String("Customer Erase Install (IPSW)".into()));

        let mut identity = Dictionary::new();
        if let Some(chip_id) = chip_id {
            identity.insert("ApChipID".into(), chip_id);
        }
        if let Some(board_id) = board_id {
            identity.insert("ApBoardID".into(), board_id);
        }
        if let Some(ubid) = unique_build_id {
            identity.insert("UniqueBuildID".into(), Value::Data(ubid.to_vec()));
        }
        identity.insert("Info".into(), Value::Dictionary(info));
        identity.insert("Manifest".into(), Value::Dictionary(Dictionary::new()));

        self.identities.push(Value::Dictionary(identity));
        self
    }

    fn document(&self) -> Value {
        let mut root = Dictionary::new();
        root.insert(
            "BuildIdentities".into(),
            Value::Array(self.identities.clone()),
        );
        root.insert("ProductVersion".into(), Value::String("15.0".into()));
        Value::Dictionary(root)
    }

    /// Serialize as an XML property list.
    pub fn build_xml(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.document()
            .to_writer_xml(&mut out)
            .expect("fixture manifest serializes");
        out
    }

    /// Serialize as a binary property list.
    pub fn build_binary(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.document()
            .to_writer_binary(&mut out)
            .expect("fixture manifest serializes");
        out
    }
}

/// Build an in-memory zip archive with deflate-compressed entries, in order.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(*name, opts).expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A candidate with a download URL under `base` and a plausible file size.
pub fn candidate(base: &str, build_id: &str, devices: &[&str]) -> FirmwareCandidate {
    FirmwareCandidate::new(
        format!("15.0 beta ({build_id})"),
        build_id,
        devices.iter().copied(),
        format!("{base}/fw/{build_id}/Restore.ipsw"),
        5_798_394_520,
    )
}
