// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod catalog;
pub mod source;
pub mod storage;

pub use adapter::PluginAdapter;
pub use catalog::DeviceCatalog;
pub use source::CandidateSource;
pub use storage::RecordStore;
