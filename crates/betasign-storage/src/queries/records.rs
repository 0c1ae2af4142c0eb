// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signing record operations.
//!
//! Device identifiers compare case-insensitively through the column's
//! `COLLATE NOCASE`; build ids compare exactly.

use betasign_core::{BetasignError, SigningRecord};
use rusqlite::types::Type;
use rusqlite::{Row, params};

use crate::database::Database;

const RECORD_COLUMNS: &str =
    "build_id, device_identifier, version, download_url, file_size_bytes, signed, checked_at";

fn record_from_row(row: &Row<'_>) -> Result<SigningRecord, rusqlite::Error> {
    let file_size: i64 = row.get(4)?;
    Ok(SigningRecord {
        build_id: row.get(0)?,
        device_identifier: row.get(1)?,
        version: row.get(2)?,
        download_url: row.get(3)?,
        file_size_bytes: u64::try_from(file_size).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, Type::Integer, Box::new(e))
        })?,
        signed: row.get(5)?,
        checked_at: row.get(6)?,
    })
}

/// Insert a record, replacing any existing record for the same pair.
pub async fn upsert_record(db: &Database, record: &SigningRecord) -> Result<(), BetasignError> {
    let record = record.clone();
    let file_size = i64::try_from(record.file_size_bytes).map_err(|_| {
        BetasignError::malformed(format!(
            "file size {} does not fit the store",
            record.file_size_bytes
        ))
    })?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO signing_records
                    (build_id, device_identifier, version, download_url, file_size_bytes, signed, checked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (build_id, device_identifier) DO UPDATE SET
                    version = excluded.version,
                    download_url = excluded.download_url,
                    file_size_bytes = excluded.file_size_bytes,
                    signed = excluded.signed,
                    checked_at = excluded.checked_at",
                params![
                    record.build_id,
                    record.device_identifier,
                    record.version,
                    record.download_url,
                    file_size,
                    record.signed,
                    record.checked_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Whether a record exists for the pair.
pub async fn record_exists(
    db: &Database,
    build_id: &str,
    device: &str,
) -> Result<bool, BetasignError> {
    let build_id = build_id.to_string();
    let device = device.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM signing_records
                 WHERE build_id = ?1 AND device_identifier = ?2)",
                params![build_id, device],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get the record for a pair.
pub async fn get_record(
    db: &Database,
    build_id: &str,
    device: &str,
) -> Result<Option<SigningRecord>, BetasignError> {
    let build_id = build_id.to_string();
    let device = device.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM signing_records
                 WHERE build_id = ?1 AND device_identifier = ?2"
            ))?;
            match stmt.query_row(params![build_id, device], record_from_row) {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete the record for a pair. Returns whether a row was removed.
pub async fn delete_record(
    db: &Database,
    build_id: &str,
    device: &str,
) -> Result<bool, BetasignError> {
    let build_id = build_id.to_string();
    let device = device.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM signing_records WHERE build_id = ?1 AND device_identifier = ?2",
                params![build_id, device],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All records for a device, newest build id first.
pub async fn records_for_device(
    db: &Database,
    device: &str,
) -> Result<Vec<SigningRecord>, BetasignError> {
    let device = device.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM signing_records
                 WHERE device_identifier = ?1 ORDER BY build_id DESC"
            ))?;
            let rows = stmt.query_map(params![device], record_from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Total number of stored records.
pub async fn count_records(db: &Database) -> Result<u64, BetasignError> {
    let count: i64 = db
        .connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM signing_records", [], |row| row.get(0)))
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(count.max(0) as u64)
}
