// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for betasign integration tests.
//!
//! Provides fixture builders and mock adapters for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`ManifestBuilder`] - Build manifests in XML or binary plist form
//! - [`zip_archive`] - In-memory firmware archives
//! - [`RangeResponder`] - wiremock responder honoring HTTP `Range` requests
//! - [`StaticSource`] / [`StaticCatalog`] - In-memory candidate source and device catalog

pub mod fixtures;
pub mod mock_catalog;
pub mod mock_source;
pub mod range;

pub use fixtures::{ManifestBuilder, candidate, zip_archive};
pub use mock_catalog::{StaticCatalog, device};
pub use mock_source::StaticSource;
pub use range::RangeResponder;
