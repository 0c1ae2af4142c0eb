// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring for the `betasign` binary.
//!
//! Kept as a library so integration tests can assemble the same component
//! graph the binary runs.

pub mod app;
pub mod commands;
pub mod shutdown;
