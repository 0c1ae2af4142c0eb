// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and migrations.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! `Database` wraps exactly one connection and every query module goes through
//! [`Database::connection`]. Do NOT create additional connections for writes.

use std::time::Duration;

use betasign_core::BetasignError;
use tracing::debug;

use crate::migrations;

/// How long SQLite waits on a locked database before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the single SQLite connection backing the result store.
pub struct Database {
    conn: tokio_rusqlite::Connection,
    in_memory: bool,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and migrate it.
    pub async fn open(path: &str) -> Result<Self, BetasignError> {
        Self::open_with(path, true).await
    }

    /// Open the database at `path`, choosing the journal mode, and migrate it.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, BetasignError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| BetasignError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| BetasignError::Storage {
                source: Box::new(e),
            })?;
        let db = Self {
            conn,
            in_memory: false,
        };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database, migrated and ready for use.
    pub async fn open_in_memory() -> Result<Self, BetasignError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| BetasignError::Storage {
                source: Box::new(e),
            })?;
        let db = Self {
            conn,
            in_memory: true,
        };
        db.prepare(false).await?;
        Ok(db)
    }

    /// The underlying connection. Every query goes through `call` on this handle.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the main database file is self-contained.
    pub async fn close(&self) -> Result<(), BetasignError> {
        if self.in_memory {
            return Ok(());
        }
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), BetasignError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.busy_timeout(BUSY_TIMEOUT)?;
                if wal_mode {
                    let mode: String =
                        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
                    debug!(mode, "journal mode set");
                }
                conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e| BetasignError::Storage {
                source: Box::new(e),
            })
    }
}

/// Convert a tokio-rusqlite error into [`BetasignError::Storage`].
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> BetasignError {
    BetasignError::Storage {
        source: Box::new(e),
    }
}
