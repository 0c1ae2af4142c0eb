// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for betasign.

use thiserror::Error;

/// The primary error type used across all betasign crates.
#[derive(Debug, Error)]
pub enum BetasignError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, row conversion).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound network failure (connect, TLS, reset, 5xx). Eligible for retry.
    #[error("network error: {message}")]
    Network {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested resource (manifest, identity, device) does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// A document was fetched but failed structural parsing.
    #[error("malformed data: {message}")]
    MalformedData { message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BetasignError {
    /// Shorthand for a [`BetasignError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Shorthand for a [`BetasignError::MalformedData`].
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedData {
            message: message.into(),
        }
    }

    /// Shorthand for a [`BetasignError::Network`] without an underlying source.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Whether a retry of the same operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}
