//! Shared holder of the current status snapshot.
//!
//! The cache is written by the scheduler task only and read by any number of
//! HTTP handlers. Snapshots are immutable and swapped whole through an
//! [`ArcSwap`], so readers never wait on a fetch and never see a mix of two
//! snapshots.

use std::sync::Arc;

use arc_swap::ArcSwap;
use log::debug;

use crate::status::StatusSnapshot;

/// The single long-lived owner of the current [`StatusSnapshot`].
///
/// # Examples
///
/// ```ignore
/// let cache = StatusCache::new();
/// assert!(!cache.get().is_verified());
///
/// let previous = cache.replace(StatusSnapshot::from_catalog(Utc::now(), |_| false));
/// assert!(!previous.is_verified());
/// assert!(cache.get().is_verified());
/// ```
pub struct StatusCache {
    current: ArcSwap<StatusSnapshot>,
}

impl StatusCache {
    /// Creates a cache holding the unverified initial snapshot.
    pub fn new() -> Self {
        StatusCache {
            current: ArcSwap::from_pointee(StatusSnapshot::unverified()),
        }
    }

    /// Returns the latest fully formed snapshot.
    pub fn get(&self) -> Arc<StatusSnapshot> {
        self.current.load_full()
    }

    /// Atomically installs `snapshot` and returns the one it replaced.
    pub fn replace(&self, snapshot: StatusSnapshot) -> Arc<StatusSnapshot> {
        debug!("replacing cached snapshot with {}", snapshot);
        self.current.swap(Arc::new(snapshot))
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}
