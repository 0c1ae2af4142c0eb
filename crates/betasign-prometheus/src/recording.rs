// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder can collect these metrics.

use std::time::Duration;

use betasign_core::{SigningStatus, SkipReason};
use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all betasign metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "betasign_signing_checks_total",
        "Signing authority checks by outcome"
    );
    describe_counter!(
        "betasign_pairs_skipped_total",
        "Build/device pairs that produced no record, by reason"
    );
    describe_counter!("betasign_cycles_total", "Completed refresh cycles");
    describe_counter!(
        "betasign_records_written_total",
        "Signing records written to the store"
    );
    describe_histogram!(
        "betasign_cycle_duration_seconds",
        "Wall time of a refresh cycle in seconds"
    );
    describe_gauge!(
        "betasign_requests_in_flight",
        "Outbound requests currently holding a limiter slot"
    );
    describe_gauge!("betasign_stored_records", "Signing records in the store");
}

/// Record the outcome of one signing check.
pub fn record_check(status: SigningStatus) {
    metrics::counter!("betasign_signing_checks_total", "status" => status.to_string())
        .increment(1);
}

/// Record `count` pairs that produced no record for `reason`.
pub fn record_skips(reason: SkipReason, count: u64) {
    metrics::counter!("betasign_pairs_skipped_total", "reason" => reason.to_string())
        .increment(count);
}

/// Record a committed refresh cycle.
pub fn record_cycle(elapsed: Duration, records_written: u64) {
    metrics::counter!("betasign_cycles_total").increment(1);
    metrics::counter!("betasign_records_written_total").increment(records_written);
    metrics::histogram!("betasign_cycle_duration_seconds").record(elapsed.as_secs_f64());
}

/// Set the number of requests holding a limiter slot.
pub fn set_in_flight(count: usize) {
    metrics::gauge!("betasign_requests_in_flight").set(count as f64);
}

/// Set the number of stored records.
pub fn set_stored_records(count: u64) {
    metrics::gauge!("betasign_stored_records").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn helpers_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            record_check(SigningStatus::Signed);
            record_check(SigningStatus::Signed);
            record_check(SigningStatus::Unknown);
            record_skips(SkipReason::ManifestNotFound, 2);
            record_cycle(Duration::from_millis(1500), 3);
            set_in_flight(7);
            set_stored_records(42);
        });

        let text = handle.render();
        assert!(text.contains(r#"betasign_signing_checks_total{status="signed"} 2"#));
        assert!(text.contains(r#"betasign_signing_checks_total{status="unknown"} 1"#));
        assert!(text.contains(r#"betasign_pairs_skipped_total{reason="manifest_not_found"} 2"#));
        assert!(text.contains("betasign_records_written_total 3"));
        assert!(text.contains("betasign_requests_in_flight 7"));
        assert!(text.contains("betasign_stored_records 42"));
    }
}
