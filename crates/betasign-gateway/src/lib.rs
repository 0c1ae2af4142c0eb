// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only HTTP lookup service over the result store.
//!
//! Serves cached signing records by device identifier, plus unauthenticated
//! health and Prometheus metrics endpoints for operators. The service never
//! triggers network work of its own; it only reads what the refresh loop
//! has committed.

pub mod handlers;
pub mod server;

pub use server::{GatewayState, HealthState, ServerConfig, router, serve, start_server};
