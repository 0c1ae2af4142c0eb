// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build manifest resolution for betasign.
//!
//! [`ManifestResolver`] obtains a candidate's `BuildManifest.plist`, either
//! from next to the firmware archive or out of the archive itself over HTTP
//! range requests. [`extract_identity`] then picks the build identity for one
//! board configuration.

pub mod identity;
pub mod remote_zip;
pub mod resolver;

pub use identity::extract_identity;
pub use resolver::ManifestResolver;
