//! The periodic fetch, diff, replace and notify loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::notify::{Notifier, Reconciler, reconcile};
use crate::scheduler::{RetryDecision, RetryPolicy, RetryState, SyncHealth};
use crate::source::{AlertSource, SourceError};
use crate::status::{StatusCache, StatusSnapshot};
use crate::telemetry;

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The cache now holds a new snapshot.
    Updated { transitions: usize, delivered: usize },
    /// Every attempt failed, the cache is unchanged.
    Skipped,
    /// Shutdown was requested during the tick, the cache is unchanged.
    Cancelled,
}

enum Fetched {
    Snapshot(StatusSnapshot),
    Exhausted(RetryState),
    Cancelled,
}

/// Drives the source on a fixed interval and keeps the cache up to date.
///
/// At most one tick runs at a time: the next one starts `update_interval`
/// after the previous one completed, whatever its outcome.
pub struct Scheduler<S: AlertSource, N: Notifier> {
    source: S,
    reconciler: Reconciler<N>,
    cache: Arc<StatusCache>,
    health: Arc<SyncHealth>,
    retry_policy: RetryPolicy,
    update_interval: Duration,
    max_failures: u32,
}

impl<S: AlertSource, N: Notifier> Scheduler<S, N> {
    /// Create a new [Scheduler].
    ///
    /// # Arguments
    ///
    /// * `source` - Where snapshots come from
    /// * `reconciler` - Delivers the transitions between snapshots
    /// * `cache` - Cache updated after every successful tick
    /// * `health` - Outcome of the ticks, shared with the HTTP facade
    /// * `retry_policy` - Attempts and backoff within one tick
    /// * `update_interval` - Pause between the end of a tick and the next one
    /// * `max_failures` - Consecutive skipped ticks before a system notice
    pub fn new(
        source: S,
        reconciler: Reconciler<N>,
        cache: Arc<StatusCache>,
        health: Arc<SyncHealth>,
        retry_policy: RetryPolicy,
        update_interval: Duration,
        max_failures: u32,
    ) -> Self {
        Scheduler {
            source,
            reconciler,
            cache,
            health,
            retry_policy,
            update_interval,
            max_failures,
        }
    }

    /// Runs ticks until `token` is cancelled. The first tick starts at once.
    pub async fn run(self, token: CancellationToken) {
        info!(
            "scheduler started, update interval {}s",
            self.update_interval.as_secs_f64()
        );

        loop {
            if self.tick(&token).await == TickOutcome::Cancelled {
                break;
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = time::sleep(self.update_interval) => {}
            }
        }

        info!("scheduler stopped");
    }

    /// Runs a single tick: fetch with retries, diff against the cached
    /// snapshot, replace the cache, then dispatch the transitions.
    pub async fn tick(&self, token: &CancellationToken) -> TickOutcome {
        let started = time::Instant::now();
        let outcome = self.update(token).await;

        let label = match outcome {
            TickOutcome::Updated { .. } => "updated",
            TickOutcome::Skipped => "skipped",
            TickOutcome::Cancelled => "cancelled",
        };
        telemetry::record_update(label, started.elapsed());

        outcome
    }

    async fn update(&self, token: &CancellationToken) -> TickOutcome {
        let snapshot = match self.fetch_with_retry(token).await {
            Fetched::Snapshot(snapshot) => snapshot,
            Fetched::Exhausted(state) => {
                self.skip(state).await;
                return TickOutcome::Skipped;
            }
            Fetched::Cancelled => {
                info!("tick cancelled, cache unchanged");
                return TickOutcome::Cancelled;
            }
        };

        let previous = self.cache.get();
        let transitions = reconcile(&previous, &snapshot);
        let fetched_at = snapshot.fetched_at().unwrap_or_else(Utc::now);

        info!("snapshot updated: {}", snapshot);
        self.cache.replace(snapshot);
        telemetry::record_snapshot(&self.cache.get());
        telemetry::record_transitions(&transitions);

        let recovered_from = self.health.record_success();
        telemetry::record_consecutive_failures(0);
        if self.max_failures > 0 && recovered_from >= self.max_failures {
            self.reconciler
                .notify_system(&format!(
                    "Alert source recovered after {} failed updates.",
                    recovered_from
                ))
                .await;
        }

        // A restart must not announce every ongoing alert again
        if !previous.is_verified() {
            if !transitions.is_empty() {
                info!(
                    "first snapshot since startup, {} active regions not announced",
                    transitions.len()
                );
            }
            return TickOutcome::Updated {
                transitions: transitions.len(),
                delivered: 0,
            };
        }

        let delivered = self.reconciler.notify(&transitions, fetched_at).await;
        TickOutcome::Updated {
            transitions: transitions.len(),
            delivered,
        }
    }

    async fn fetch_with_retry(&self, token: &CancellationToken) -> Fetched {
        let mut state = RetryState::new(self.retry_policy);

        loop {
            let started = time::Instant::now();
            let result = tokio::select! {
                _ = token.cancelled() => return Fetched::Cancelled,
                result = self.source.fetch() => result,
            };
            let outcome = match &result {
                Ok(_) => "success",
                Err(SourceError::Unavailable(_)) => "unavailable",
                Err(SourceError::Format(_)) => "format",
            };
            telemetry::record_source_request(outcome, started.elapsed());

            let error = match result {
                Ok(snapshot) => return Fetched::Snapshot(snapshot),
                Err(error) => error,
            };

            let attempt = state.attempts() + 1;
            match &error {
                SourceError::Unavailable(_) => warn!("fetch attempt {} failed: {}", attempt, error),
                SourceError::Format(_) => error!("fetch attempt {} failed: {}", attempt, error),
            }

            match state.record_failure(error) {
                RetryDecision::Retry(delay) => {
                    info!("retrying fetch in {}s", delay.as_secs_f64());
                    tokio::select! {
                        _ = token.cancelled() => return Fetched::Cancelled,
                        _ = time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp => return Fetched::Exhausted(state),
            }
        }
    }

    async fn skip(&self, state: RetryState) {
        let attempts = state.attempts();
        let reason = state
            .into_last_error()
            .map(|e| e.to_string())
            .unwrap_or_default();

        let failures = self.health.record_failure(&reason);
        telemetry::record_consecutive_failures(failures);
        error!(
            "tick skipped after {} attempts ({} in a row), cache unchanged: {}",
            attempts, failures, reason
        );

        if self.max_failures > 0 && failures % self.max_failures == 0 {
            self.reconciler
                .notify_system(&format!(
                    "Alert source unreachable for {} consecutive updates.\nLast error: {}",
                    failures, reason
                ))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use mockall::Sequence;

    use super::*;
    use crate::notify::MockNotifier;
    use crate::source::MockAlertSource;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    fn snapshot(active: &[&str]) -> StatusSnapshot {
        StatusSnapshot::from_catalog(Utc::now(), |r| active.contains(&r.id))
    }

    fn unavailable() -> SourceError {
        SourceError::Unavailable("connection refused".to_owned())
    }

    fn scheduler(
        source: MockAlertSource,
        notifier: Option<MockNotifier>,
        cache: &Arc<StatusCache>,
        max_retries: u32,
    ) -> Scheduler<MockAlertSource, MockNotifier> {
        Scheduler::new(
            source,
            match notifier {
                Some(notifier) => Reconciler::new(notifier, Duration::from_secs(5)),
                None => Reconciler::log_only(),
            },
            Arc::clone(cache),
            Arc::new(SyncHealth::new()),
            policy(max_retries),
            Duration::from_secs(60),
            5,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_fills_cache_without_notifying() {
        let mut source = MockAlertSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|| Ok(snapshot(&["kyiv", "kharkiv"])));
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let cache = Arc::new(StatusCache::new());
        let scheduler = scheduler(source, Some(notifier), &cache, 3);

        let outcome = scheduler.tick(&CancellationToken::new()).await;

        assert_eq!(
            outcome,
            TickOutcome::Updated {
                transitions: 2,
                delivered: 0
            }
        );
        assert!(cache.get().is_verified());
        assert_eq!(cache.get().active_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_notifies_transitions_after_replacing_cache() {
        let cache = Arc::new(StatusCache::new());
        cache.replace(snapshot(&["lviv"]));

        let mut source = MockAlertSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|| Ok(snapshot(&["lviv", "kyiv"])));

        let observed = Arc::clone(&cache);
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .times(1)
            .withf(|message| message.contains("Київська область"))
            .returning(move |_| {
                // The new snapshot is readable before any delivery
                assert!(observed.get().get("kyiv").unwrap().alert_active);
                Ok(())
            });

        let scheduler = scheduler(source, Some(notifier), &cache, 3);
        let outcome = scheduler.tick(&CancellationToken::new()).await;

        assert_eq!(
            outcome,
            TickOutcome::Updated {
                transitions: 1,
                delivered: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_retries_with_backoff_then_skips() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);

        let mut source = MockAlertSource::new();
        source.expect_fetch().times(3).returning(move || {
            recorded.lock().unwrap().push(time::Instant::now());
            Err(unavailable())
        });

        let cache = Arc::new(StatusCache::new());
        cache.replace(snapshot(&["odesa"]));
        let before = cache.get();

        let scheduler = scheduler(source, None, &cache, 3);
        let outcome = scheduler.tick(&CancellationToken::new()).await;

        assert_eq!(outcome, TickOutcome::Skipped);
        assert!(Arc::ptr_eq(&before, &cache.get()));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_secs(1));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(2));

        assert_eq!(scheduler.health.consecutive_failures(), 1);
        assert_eq!(
            scheduler.health.last_error().as_deref(),
            Some("alert source unavailable: connection refused")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_format_error_leaves_cache_unchanged() {
        let mut source = MockAlertSource::new();
        source
            .expect_fetch()
            .times(2)
            .returning(|| Err(SourceError::Format("missing alerts".to_owned())));

        let cache = Arc::new(StatusCache::new());
        let before = cache.get();

        let scheduler = scheduler(source, None, &cache, 2);
        assert_eq!(
            scheduler.tick(&CancellationToken::new()).await,
            TickOutcome::Skipped
        );
        assert_eq!(*before, *cache.get());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_recovers_within_retry_budget() {
        let mut source = MockAlertSource::new();
        let mut sequence = Sequence::new();
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Err(unavailable()));
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(snapshot(&["sumy"])));

        let cache = Arc::new(StatusCache::new());
        let scheduler = scheduler(source, None, &cache, 3);

        let start = time::Instant::now();
        let outcome = scheduler.tick(&CancellationToken::new()).await;

        assert!(matches!(outcome, TickOutcome::Updated { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(cache.get().get("sumy").unwrap().alert_active);
        assert_eq!(scheduler.health.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_restarts_every_tick() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);

        let mut source = MockAlertSource::new();
        source.expect_fetch().times(4).returning(move || {
            recorded.lock().unwrap().push(time::Instant::now());
            Err(unavailable())
        });

        let cache = Arc::new(StatusCache::new());
        let scheduler = scheduler(source, None, &cache, 2);
        let token = CancellationToken::new();

        scheduler.tick(&token).await;
        scheduler.tick(&token).await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls[1] - calls[0], Duration::from_secs(1));
        assert_eq!(calls[3] - calls[2], Duration::from_secs(1));
        assert_eq!(scheduler.health.consecutive_failures(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_notice_on_repeated_failures_and_recovery() {
        let mut calls = 0;
        let mut source = MockAlertSource::new();
        source.expect_fetch().times(5).returning(move || {
            calls += 1;
            if calls <= 4 {
                Err(unavailable())
            } else {
                Ok(snapshot(&[]))
            }
        });

        let mut notifier = MockNotifier::new();
        let mut sequence = Sequence::new();
        notifier
            .expect_send()
            .times(2)
            .in_sequence(&mut sequence)
            .withf(|message| message.contains("unreachable"))
            .returning(|_| Ok(()));
        notifier
            .expect_send()
            .times(1)
            .in_sequence(&mut sequence)
            .withf(|message| message.contains("recovered after 4 failed updates"))
            .returning(|_| Ok(()));

        let cache = Arc::new(StatusCache::new());
        let scheduler = Scheduler::new(
            source,
            Reconciler::new(notifier, Duration::from_secs(5)),
            Arc::clone(&cache),
            Arc::new(SyncHealth::new()),
            policy(1),
            Duration::from_secs(60),
            2,
        );

        let token = CancellationToken::new();
        for _ in 0..4 {
            assert_eq!(scheduler.tick(&token).await, TickOutcome::Skipped);
        }
        assert!(matches!(
            scheduler.tick(&token).await,
            TickOutcome::Updated { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let mut source = MockAlertSource::new();
        source.expect_fetch().times(1).returning(|| Err(unavailable()));

        let cache = Arc::new(StatusCache::new());
        let before = cache.get();
        let scheduler = Scheduler::new(
            source,
            Reconciler::<MockNotifier>::log_only(),
            Arc::clone(&cache),
            Arc::new(SyncHealth::new()),
            RetryPolicy {
                max_retries: 5,
                base_delay: Duration::from_secs(10),
                max_delay: Duration::from_secs(60),
            },
            Duration::from_secs(60),
            5,
        );

        let token = CancellationToken::new();
        let start = time::Instant::now();
        let (outcome, _) = tokio::join!(scheduler.tick(&token), async {
            time::sleep(Duration::from_secs(3)).await;
            token.cancel();
        });

        assert_eq!(outcome, TickOutcome::Cancelled);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert!(Arc::ptr_eq(&before, &cache.get()));
        assert_eq!(scheduler.health.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_on_interval_until_cancelled() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);

        let mut source = MockAlertSource::new();
        source.expect_fetch().times(3).returning(move || {
            recorded.lock().unwrap().push(time::Instant::now());
            Ok(snapshot(&[]))
        });

        let cache = Arc::new(StatusCache::new());
        let scheduler = scheduler(source, None, &cache, 3);

        let token = CancellationToken::new();
        let start = time::Instant::now();
        tokio::join!(scheduler.run(token.clone()), async {
            time::sleep(Duration::from_secs(150)).await;
            token.cancel();
        });

        assert_eq!(start.elapsed(), Duration::from_secs(150));
        let offsets: Vec<_> = calls
            .lock()
            .unwrap()
            .iter()
            .map(|at| (*at - start).as_secs())
            .collect();
        assert_eq!(offsets, vec![0, 60, 120]);
        assert!(cache.get().is_verified());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_interval_is_configurable() {
        for seconds in [30, 600] {
            let mut source = MockAlertSource::new();
            source.expect_fetch().times(2).returning(|| Ok(snapshot(&[])));

            let scheduler = Scheduler::new(
                source,
                Reconciler::<MockNotifier>::log_only(),
                Arc::new(StatusCache::new()),
                Arc::new(SyncHealth::new()),
                policy(3),
                Duration::from_secs(seconds),
                5,
            );

            let token = CancellationToken::new();
            tokio::join!(scheduler.run(token.clone()), async {
                time::sleep(Duration::from_secs(seconds + seconds / 2)).await;
                token.cancel();
            });
        }
    }
}
