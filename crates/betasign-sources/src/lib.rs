// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate sources and device catalog adapters.
//!
//! - [`JsonFeedSource`]: candidate list fetched from an HTTP JSON feed.
//! - [`FileSource`]: the same document read from disk.
//! - [`HttpDeviceCatalog`]: device identifier to board/chip ids, memoized.

pub mod catalog;
pub mod feed;
pub mod file;

pub use catalog::HttpDeviceCatalog;
pub use feed::{JsonFeedSource, parse_feed};
pub use file::FileSource;
