// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives shared by every outbound network call.
//!
//! - [`ConcurrencyLimiter`]: process-wide cap on in-flight requests, with RAII permits.
//! - [`RetryPolicy`]: fixed-attempt retry of transient failures.

pub mod limiter;
pub mod retry;

pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use retry::RetryPolicy;
