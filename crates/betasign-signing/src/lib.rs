// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client for the remote signing authority.
//!
//! [`SigningRequest`] turns a build identity into the authority's binary
//! property-list request; [`SigningClient`] submits it and classifies the
//! answer as signed, unsigned, or unknown.

pub mod client;
pub mod request;

pub use client::{SigningClient, classify_response};
pub use request::{SigningRequest, TicketKind};
