//! Prometheus metrics.
//!
//! Metrics are recorded through the `metrics` facade and rendered in the
//! Prometheus text format on `GET /metrics`.
//!
//! | Metric | Type | Labels |
//! |---|---|---|
//! | `airalarm_source_requests_total` | counter | `outcome`: `success`, `unavailable`, `format` |
//! | `airalarm_source_request_duration_seconds` | histogram | |
//! | `airalarm_updates_total` | counter | `outcome`: `updated`, `skipped`, `cancelled` |
//! | `airalarm_update_duration_seconds` | histogram | |
//! | `airalarm_transitions_total` | counter | `state`: `started`, `ended` |
//! | `airalarm_notifications_total` | counter | `kind`: `transition`, `system`; `outcome`: `delivered`, `failed` |
//! | `airalarm_regions_total` | gauge | |
//! | `airalarm_active_alerts` | gauge | |
//! | `airalarm_inactive_regions` | gauge | |
//! | `airalarm_region_alert_active` | gauge | `region` |
//! | `airalarm_consecutive_failures` | gauge | |

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::notify::Transition;
use crate::status::StatusSnapshot;

const SOURCE_REQUESTS: &str = "airalarm_source_requests_total";
const SOURCE_REQUEST_DURATION: &str = "airalarm_source_request_duration_seconds";
const UPDATES: &str = "airalarm_updates_total";
const UPDATE_DURATION: &str = "airalarm_update_duration_seconds";
const TRANSITIONS: &str = "airalarm_transitions_total";
const NOTIFICATIONS: &str = "airalarm_notifications_total";
const REGIONS_TOTAL: &str = "airalarm_regions_total";
const ACTIVE_ALERTS: &str = "airalarm_active_alerts";
const INACTIVE_REGIONS: &str = "airalarm_inactive_regions";
const REGION_ALERT_ACTIVE: &str = "airalarm_region_alert_active";
const CONSECUTIVE_FAILURES: &str = "airalarm_consecutive_failures";

/// Kind of a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Transition,
    System,
}

/// Installs the process-wide Prometheus recorder.
///
/// # Errors
///
/// Fails if a recorder is already installed.
pub fn install() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(handle)
}

fn describe() {
    describe_counter!(SOURCE_REQUESTS, "Requests sent to the alert source, by outcome");
    describe_histogram!(
        SOURCE_REQUEST_DURATION,
        metrics::Unit::Seconds,
        "Duration of a single alert source request"
    );
    describe_counter!(UPDATES, "Scheduler updates, by outcome");
    describe_histogram!(
        UPDATE_DURATION,
        metrics::Unit::Seconds,
        "Duration of an update, retries included"
    );
    describe_counter!(TRANSITIONS, "Region alert transitions detected");
    describe_counter!(NOTIFICATIONS, "Notifications sent, by kind and outcome");
    describe_gauge!(REGIONS_TOTAL, "Regions in the current snapshot");
    describe_gauge!(ACTIVE_ALERTS, "Regions currently under alert");
    describe_gauge!(INACTIVE_REGIONS, "Regions currently without alert");
    describe_gauge!(REGION_ALERT_ACTIVE, "1 while the region is under alert");
    describe_gauge!(CONSECUTIVE_FAILURES, "Updates skipped in a row");
}

/// Records one alert source request.
pub fn record_source_request(outcome: &'static str, elapsed: Duration) {
    counter!(SOURCE_REQUESTS, "outcome" => outcome).increment(1);
    histogram!(SOURCE_REQUEST_DURATION).record(elapsed.as_secs_f64());
}

/// Records the end of an update.
pub fn record_update(outcome: &'static str, elapsed: Duration) {
    counter!(UPDATES, "outcome" => outcome).increment(1);
    histogram!(UPDATE_DURATION).record(elapsed.as_secs_f64());
}

pub fn record_transitions(transitions: &[Transition]) {
    for transition in transitions {
        let state = if transition.current { "started" } else { "ended" };
        counter!(TRANSITIONS, "state" => state).increment(1);
    }
}

pub fn record_delivery(kind: Delivery, delivered: bool) {
    let kind = match kind {
        Delivery::Transition => "transition",
        Delivery::System => "system",
    };
    let outcome = if delivered { "delivered" } else { "failed" };
    counter!(NOTIFICATIONS, "kind" => kind, "outcome" => outcome).increment(1);
}

/// Sets the status gauges from the snapshot now in the cache.
pub fn record_snapshot(snapshot: &StatusSnapshot) {
    let total = snapshot.regions().len();
    let active = snapshot.active_count();

    gauge!(REGIONS_TOTAL).set(total as f64);
    gauge!(ACTIVE_ALERTS).set(active as f64);
    gauge!(INACTIVE_REGIONS).set((total - active) as f64);
    for status in snapshot.regions() {
        let value = if status.alert_active { 1.0 } else { 0.0 };
        gauge!(REGION_ALERT_ACTIVE, "region" => status.region_id).set(value);
    }
}

pub fn record_consecutive_failures(failures: u32) {
    gauge!(CONSECUTIVE_FAILURES).set(f64::from(failures));
}

/// Value of the sample `series` in a rendered exposition, if present.
#[cfg(test)]
pub fn sample(rendered: &str, series: &str) -> Option<f64> {
    rendered.lines().find_map(|line| {
        line.strip_prefix(series)
            .and_then(|rest| rest.strip_prefix(' '))
            .and_then(|value| value.trim().parse().ok())
    })
}

/// Handle of the process-wide recorder, installed on first use.
///
/// Tests sharing it run concurrently, so only lower bounds of counters are
/// meaningful.
#[cfg(test)]
pub fn global_handle() -> PrometheusHandle {
    use std::sync::OnceLock;

    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| install().expect("no other recorder is installed by the tests"))
        .clone()
}
