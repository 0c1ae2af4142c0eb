// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry of transient failures.
//!
//! Only errors for which [`BetasignError::is_transient`] holds are retried.
//! Everything else is returned from the first attempt that produced it.

use std::future::Future;
use std::time::Duration;

use betasign_core::BetasignError;
use tracing::{debug, warn};

/// Fixed-attempt retry policy for one kind of network operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Policy making up to `max_attempts` attempts (at least one) with no pause between them.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    /// Pause for `delay` before each retry.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. The last transient error is
    /// returned once attempts are exhausted.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut op: F) -> Result<T, BetasignError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, BetasignError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(operation, attempt, error = %e, "transient failure, will retry");
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    debug!(operation, attempt, error = %e, "giving up");
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_failures_use_every_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::new(5)
            .run("manifest", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BetasignError::network("503")) }
            })
            .await;
        assert!(matches!(result, Err(BetasignError::Network { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::new(5)
            .run("manifest", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BetasignError::not_found("BuildManifest.plist")) }
            })
            .await;
        assert!(matches!(result, Err(BetasignError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_after_transient_failures() {
        let result = RetryPolicy::new(3)
            .run("signing", |attempt| async move {
                if attempt < 3 {
                    Err(BetasignError::Timeout {
                        duration: Duration::from_secs(30),
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0);
        let out = policy.run("catalog", |_| async { Ok(7) }).await.unwrap();
        assert_eq!(out, 7);

        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy
            .run("catalog", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BetasignError::network("reset")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied_between_attempts() {
        let start = tokio::time::Instant::now();
        let _: Result<(), _> = RetryPolicy::new(3)
            .with_delay(Duration::from_secs(1))
            .run("signing", |_| async { Err(BetasignError::network("reset")) })
            .await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}
