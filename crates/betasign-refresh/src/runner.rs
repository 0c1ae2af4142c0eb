// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The refresh loop: one cycle at a time, forever, until cancelled.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use betasign_config::model::RefreshConfig;
use betasign_core::{
    BetasignError, CandidateSource, DeviceCatalog, PairKey, RecordStore, SkipReason,
};
use chrono::Utc;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::pipeline::{ManifestFetcher, PendingPair, SigningCheck, Stages};
use crate::report::{CycleReport, PairOutcome};
use crate::state::RefreshState;

/// Read-only view of a running loop, for health reporting.
#[derive(Clone)]
pub struct RefreshHandle {
    state: watch::Receiver<RefreshState>,
    last_report: watch::Receiver<Option<CycleReport>>,
}

impl RefreshHandle {
    pub fn state(&self) -> RefreshState {
        *self.state.borrow()
    }

    /// Report of the most recent committed cycle.
    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.borrow().clone()
    }

    /// Wait until the loop reaches `target`.
    pub async fn wait_for(&mut self, target: RefreshState) -> Result<(), BetasignError> {
        self.state
            .wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| BetasignError::Internal("refresh loop dropped".into()))
    }
}

/// Drives refresh cycles over a candidate source.
pub struct RefreshLoop {
    source: Arc<dyn CandidateSource>,
    stages: Stages,
    interval: Duration,
    recheck_after: Option<chrono::Duration>,
    state: watch::Sender<RefreshState>,
    last_report: watch::Sender<Option<CycleReport>>,
}

impl RefreshLoop {
    pub fn new(
        config: &RefreshConfig,
        source: Arc<dyn CandidateSource>,
        catalog: Arc<dyn DeviceCatalog>,
        manifests: Arc<dyn ManifestFetcher>,
        signer: Arc<dyn SigningCheck>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        let (state, _) = watch::channel(RefreshState::Idle);
        let (last_report, _) = watch::channel(None);
        Self {
            source,
            stages: Stages {
                catalog,
                manifests,
                signer,
                store,
            },
            interval: Duration::from_secs(config.interval_secs),
            recheck_after: config
                .recheck_after_secs
                .and_then(|secs| chrono::Duration::try_seconds(i64::try_from(secs).ok()?)),
            state,
            last_report,
        }
    }

    pub fn handle(&self) -> RefreshHandle {
        RefreshHandle {
            state: self.state.subscribe(),
            last_report: self.last_report.subscribe(),
        }
    }

    pub fn state(&self) -> RefreshState {
        *self.state.borrow()
    }

    /// Run cycles until `cancel` fires.
    ///
    /// A cycle in progress always completes; cancellation only cuts the
    /// sleep between cycles short.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "refresh loop started");
        while !cancel.is_cancelled() {
            if let Err(e) = self.run_cycle().await {
                warn!(error = %e, "refresh cycle failed");
            }
            self.state.send_replace(RefreshState::Idle);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        self.state.send_replace(RefreshState::Idle);
        info!("refresh loop stopped");
    }

    /// Run one full cycle.
    ///
    /// Fails only when the candidate source fails; every per-pair failure is
    /// counted in the report instead.
    pub async fn run_cycle(&self) -> Result<CycleReport, BetasignError> {
        let started = Instant::now();
        let mut report = CycleReport {
            started_at: Some(Utc::now()),
            ..CycleReport::default()
        };

        self.state.send_replace(RefreshState::Fetching);
        let candidates = match self.source.fetch().await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.state.send_replace(RefreshState::Idle);
                return Err(e);
            }
        };
        report.candidates = candidates.len();

        self.state.send_replace(RefreshState::Resolving);
        let mut claimed: HashSet<PairKey> = HashSet::new();
        let mut tasks = JoinSet::new();

        for candidate in candidates {
            let mut pending = Vec::new();
            for device in &candidate.device_identifiers {
                if !claimed.insert(PairKey::new(&candidate.build_id, device)) {
                    continue;
                }
                report.pairs_considered += 1;
                match self.needs_check(&candidate.build_id, device).await {
                    Ok(Some(recheck)) => pending.push(PendingPair {
                        device: device.clone(),
                        recheck,
                    }),
                    Ok(None) => report.skip(SkipReason::AlreadyRecorded),
                    Err(e) => {
                        error!(build_id = %candidate.build_id, %device, error = %e, "store read failed");
                        report.skip(SkipReason::Store);
                    }
                }
            }
            if pending.is_empty() {
                continue;
            }

            report.pairs_scheduled += pending.len();
            let stages = self.stages.clone();
            let candidate = Arc::new(candidate);
            tasks.spawn(async move {
                let build_id = candidate.build_id.clone();
                let pairs = pending.len();
                AssertUnwindSafe(stages.resolve_candidate(candidate, pending))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        error!(%build_id, pairs, "candidate task panicked");
                        vec![PairOutcome::Skipped(SkipReason::TaskFailed); pairs]
                    })
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcomes) => outcomes.into_iter().for_each(|o| report.apply(o)),
                Err(e) => error!(error = %e, "candidate task failed"),
            }
        }

        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.state.send_replace(RefreshState::Committed);

        betasign_prometheus::record_cycle(started.elapsed(), report.records_written() as u64);
        for (reason, count) in &report.skipped {
            betasign_prometheus::record_skips(*reason, *count as u64);
        }
        match self.stages.store.count().await {
            Ok(count) => betasign_prometheus::set_stored_records(count),
            Err(e) => warn!(error = %e, "could not count stored records"),
        }

        info!(
            candidates = report.candidates,
            considered = report.pairs_considered,
            scheduled = report.pairs_scheduled,
            signed = report.signed,
            unsigned = report.unsigned,
            invalidated = report.invalidated,
            skipped = report.skipped_total(),
            elapsed_ms = report.elapsed_ms,
            "refresh cycle committed"
        );
        self.last_report.send_replace(Some(report.clone()));
        Ok(report)
    }

    /// `Some(recheck)` if the pair must be resolved, `None` if its record is current.
    async fn needs_check(&self, build_id: &str, device: &str) -> Result<Option<bool>, BetasignError> {
        let store = &self.stages.store;
        match self.recheck_after {
            None => Ok((!store.exists(build_id, device).await?).then_some(false)),
            Some(max_age) => match store.get(build_id, device).await? {
                None => Ok(Some(false)),
                Some(record) if record.is_older_than(max_age, Utc::now()) => Ok(Some(true)),
                Some(_) => Ok(None),
            },
        }
    }
}
