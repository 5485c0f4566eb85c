//! Health of the synchronization with the alert source.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use arc_swap::ArcSwapOption;

/// Outcome of the recent ticks, shared between the scheduler and the HTTP
/// facade.
///
/// Only the scheduler writes it. Readers may observe the failure counter and
/// the last error from two different ticks, which is acceptable for health
/// reporting.
#[derive(Default)]
pub struct SyncHealth {
    consecutive_failures: AtomicU32,
    last_error: ArcSwapOption<String>,
}

impl SyncHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a tick that updated the cache.
    ///
    /// # Returns
    ///
    /// The number of consecutive skipped ticks this success ends.
    pub fn record_success(&self) -> u32 {
        self.consecutive_failures.swap(0, Ordering::AcqRel)
    }

    /// Records a skipped tick.
    ///
    /// # Returns
    ///
    /// The number of consecutive skipped ticks, this one included.
    pub fn record_failure(&self, error: &str) -> u32 {
        self.last_error.store(Some(Arc::new(error.to_owned())));
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Error of the last skipped tick, kept after recovery.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.load_full().map(|error| error.as_ref().clone())
    }
}
