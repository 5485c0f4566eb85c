//! Snapshot diffing and transition delivery.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use tokio::time;

use crate::notify::{Notifier, NotifyError, format_system_alert, format_transition};
use crate::status::StatusSnapshot;
use crate::telemetry::{self, Delivery};

/// A change of alert status of one region between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub region_id: &'static str,
    pub name: &'static str,
    pub previous: bool,
    pub current: bool,
}

/// Computes the transitions from `previous` to `current`, in catalog order.
///
/// A transition is produced only for regions whose status differs, so
/// `reconcile(s, s)` is always empty.
///
/// # Examples
///
/// ```ignore
/// let previous = StatusSnapshot::from_catalog(now, |_| false);
/// let current = StatusSnapshot::from_catalog(now, |r| r.id == "kyiv");
/// let transitions = reconcile(&previous, &current);
/// assert_eq!(transitions.len(), 1);
/// assert_eq!(transitions[0].region_id, "kyiv");
/// ```
pub fn reconcile(previous: &StatusSnapshot, current: &StatusSnapshot) -> Vec<Transition> {
    // Both snapshots are built from the catalog, so regions line up by index
    previous
        .regions()
        .iter()
        .zip(current.regions())
        .filter(|(before, after)| before.alert_active != after.alert_active)
        .map(|(before, after)| {
            debug_assert_eq!(before.region_id, after.region_id);
            Transition {
                region_id: after.region_id,
                name: after.name,
                previous: before.alert_active,
                current: after.alert_active,
            }
        })
        .collect()
}

/// Delivers transitions and system notices through an optional [`Notifier`].
///
/// Without a notifier, transitions are only logged. Every delivery is bounded
/// by the notifier timeout and attempted independently of the others.
pub struct Reconciler<N: Notifier> {
    transport: Option<Transport<N>>,
}

struct Transport<N> {
    notifier: N,
    /// Deadline of a single delivery
    timeout: Duration,
}

impl<N: Notifier> Reconciler<N> {
    /// Create a new [Reconciler] delivering through `notifier`.
    ///
    /// # Arguments
    ///
    /// * `notifier` - Transport used for deliveries
    /// * `timeout` - Deadline for a single delivery
    pub fn new(notifier: N, timeout: Duration) -> Self {
        Reconciler {
            transport: Some(Transport { notifier, timeout }),
        }
    }

    /// Create a [Reconciler] that only logs transitions.
    pub fn log_only() -> Self {
        Reconciler { transport: None }
    }

    /// Sends one message per transition, in order.
    ///
    /// # Returns
    ///
    /// The number of messages delivered successfully.
    pub async fn notify(&self, transitions: &[Transition], at: DateTime<Utc>) -> usize {
        for transition in transitions {
            info!(
                "region {} alert {} -> {}",
                transition.region_id, transition.previous, transition.current
            );
        }

        let Some(transport) = &self.transport else {
            debug!("no notifier configured, {} transitions not sent", transitions.len());
            return 0;
        };

        let mut delivered = 0;
        for transition in transitions {
            let message = format_transition(transition, at);
            let result = transport.deliver(&message).await;
            telemetry::record_delivery(Delivery::Transition, result.is_ok());
            match result {
                Ok(()) => delivered += 1,
                Err(e) => error!(
                    "failed to notify transition of region {}: {}",
                    transition.region_id, e
                ),
            }
        }

        delivered
    }

    /// Sends an operational notice.
    ///
    /// # Returns
    ///
    /// `true` if the notice was delivered.
    pub async fn notify_system(&self, text: &str) -> bool {
        let Some(transport) = &self.transport else {
            return false;
        };

        let result = transport.deliver(&format_system_alert(text)).await;
        telemetry::record_delivery(Delivery::System, result.is_ok());
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("failed to send system notice: {}", e);
                false
            }
        }
    }
}

impl<N: Notifier> Transport<N> {
    async fn deliver(&self, message: &str) -> Result<(), NotifyError> {
        match time::timeout(self.timeout, self.notifier.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.timeout)),
        }
    }
}
