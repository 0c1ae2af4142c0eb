// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counting limiter for outbound network operations.
//!
//! Every outbound call holds a [`LimiterPermit`] for its whole duration. The
//! permit is released on drop, so early returns, `?`, timeouts, task
//! cancellation and panics all give the slot back.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use betasign_core::BetasignError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Process-wide cap on concurrent outbound requests.
///
/// Cheap to clone; clones share the same slots and counters.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` slots. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<LimiterPermit, BetasignError> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| BetasignError::Internal("concurrency limiter closed".into()))?;
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        Ok(LimiterPermit {
            _permit: permit,
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of slots ever held at once.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

/// A held limiter slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
    inner: Arc<Inner>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn permit_counts_in_flight() {
        let limiter = ConcurrencyLimiter::new(2);
        let a = limiter.acquire().await.unwrap();
        let b = limiter.acquire().await.unwrap();
        assert_eq!(limiter.in_flight(), 2);
        drop(a);
        assert_eq!(limiter.in_flight(), 1);
        drop(b);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.peak(), 2);
    }

    #[tokio::test]
    async fn zero_capacity_is_raised_to_one() {
        let limiter = ConcurrencyLimiter::new(0);
        assert_eq!(limiter.capacity(), 1);
        let _p = limiter.acquire().await.unwrap();
    }

    async fn failing_call(limiter: &ConcurrencyLimiter) -> Result<(), BetasignError> {
        let _permit = limiter.acquire().await?;
        Err(BetasignError::network("connection reset"))
    }

    #[tokio::test]
    async fn early_error_return_releases_slot() {
        let limiter = ConcurrencyLimiter::new(1);
        assert!(failing_call(&limiter).await.is_err());
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancelled_task_releases_slot() {
        let limiter = ConcurrencyLimiter::new(1);
        let held = limiter.clone();
        let handle = tokio::spawn(async move {
            let _permit = held.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        while limiter.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        handle.abort();
        let _ = handle.await;
        assert_eq!(limiter.in_flight(), 0);
        assert!(limiter.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn panicking_task_releases_slot() {
        let limiter = ConcurrencyLimiter::new(1);
        let held = limiter.clone();
        let handle = tokio::spawn(async move {
            let _permit = held.acquire().await.unwrap();
            panic!("boom");
        });
        assert!(handle.await.is_err());
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn never_exceeds_capacity_under_load() {
        let limiter = ConcurrencyLimiter::new(100);
        let tasks: Vec<_> = (0..1000)
            .map(|i| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    let _permit = limiter.acquire().await?;
                    tokio::time::sleep(Duration::from_millis(1 + (i % 5))).await;
                    Ok::<_, BetasignError>(())
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert!(limiter.peak() <= 100, "peak {} exceeded capacity", limiter.peak());
        assert!(limiter.peak() > 1);
        assert_eq!(limiter.in_flight(), 0);
    }
}
