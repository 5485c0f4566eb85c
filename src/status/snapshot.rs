//! Immutable per-region alert status snapshots.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::catalog::{CATALOG, Region};

/// Alert status of one region inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionStatus {
    /// Canonical region id from the catalog
    pub region_id: &'static str,
    /// Region display name
    pub name: &'static str,
    /// Whether an air raid alert is active
    pub alert_active: bool,
}

/// A complete, consistent set of region statuses at one point in time.
///
/// A snapshot always holds exactly one [`RegionStatus`] per catalog region,
/// in catalog order. The only way to build one is through the catalog, so a
/// partial snapshot cannot exist.
///
/// `fetched_at` is `None` for the initial snapshot served before the first
/// successful fetch: every region is reported inactive but unverified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    regions: Vec<RegionStatus>,
    fetched_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Builds a verified snapshot, asking `alert_active` for every catalog region.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let snapshot = StatusSnapshot::from_catalog(Utc::now(), |region| region.id == "kyiv");
    /// assert_eq!(snapshot.active_count(), 1);
    /// ```
    pub fn from_catalog(
        fetched_at: DateTime<Utc>,
        alert_active: impl FnMut(&'static Region) -> bool,
    ) -> Self {
        Self::build(Some(fetched_at), alert_active)
    }

    /// The snapshot served before any fetch succeeded.
    pub fn unverified() -> Self {
        Self::build(None, |_| false)
    }

    fn build(
        fetched_at: Option<DateTime<Utc>>,
        mut alert_active: impl FnMut(&'static Region) -> bool,
    ) -> Self {
        let regions = CATALOG
            .iter()
            .map(|region| RegionStatus {
                region_id: region.id,
                name: region.name,
                alert_active: alert_active(region),
            })
            .collect();

        StatusSnapshot {
            regions,
            fetched_at,
        }
    }

    /// Region statuses in catalog order.
    pub fn regions(&self) -> &[RegionStatus] {
        &self.regions
    }

    /// Status of a single region by canonical id.
    pub fn get(&self, region_id: &str) -> Option<&RegionStatus> {
        self.regions.iter().find(|status| status.region_id == region_id)
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Whether this snapshot comes from a successful fetch.
    pub fn is_verified(&self) -> bool {
        self.fetched_at.is_some()
    }

    /// Number of regions with an active alert.
    pub fn active_count(&self) -> usize {
        self.regions.iter().filter(|status| status.alert_active).count()
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.fetched_at {
            Some(fetched_at) => write!(
                f,
                "{}/{} active at {}",
                self.active_count(),
                self.regions.len(),
                fetched_at.to_rfc3339()
            ),
            None => write!(f, "unverified, {} regions", self.regions.len()),
        }
    }
}
