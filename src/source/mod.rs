//! Alert source client: fetching and parsing region alert statuses.
//!
//! # Modules
//!
//! - `requester` - HTTP client retrieving the raw payload from the alert source
//! - `parsers` - one [`PayloadParser`] per supported payload format
//! - `http_source` - [`HttpAlertSource`], combining a requester and a parser
//!
//! Whatever the format, a fetch either yields a snapshot covering the whole
//! catalog or fails with a [`SourceError`]. It never yields a partial one.

mod http_source;
mod parsers;
mod requester;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::warn;
use mockall::automock;
use serde::Deserialize;
use thiserror::Error;

use crate::catalog::{self, RegionKey};
use crate::status::StatusSnapshot;

pub use crate::source::http_source::HttpAlertSource;
pub use crate::source::parsers::parser_for;
pub use crate::source::requester::AlertsRequester;
#[cfg(test)]
pub use crate::source::requester::MockRequester;

/// Errors raised by a fetch.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network failure, timeout or non-success response.
    #[error("alert source unavailable: {0}")]
    Unavailable(String),
    /// The payload does not have the expected structure.
    #[error("unexpected alert source payload: {0}")]
    Format(String),
}

/// Supported payload formats, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// alerts.in.ua IoT status string, one character per region
    StatusString,
    /// alerts.in.ua list of active alerts
    ActiveAlerts,
    /// SVG map with one element per region
    SvgMap,
}

/// One region status as reported by a payload, before catalog matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Region key in the parser's [`RegionKey`] kind
    pub key: String,
    pub alert_active: bool,
}

impl Reading {
    pub fn new(key: impl Into<String>, alert_active: bool) -> Self {
        Reading {
            key: key.into(),
            alert_active,
        }
    }
}

/// Anything able to produce a complete status snapshot.
///
/// Abstracts the network so the scheduler can be driven by a mock in tests.
#[automock]
pub trait AlertSource {
    /// Fetches and parses the current alert status of every catalog region.
    async fn fetch(&self) -> Result<StatusSnapshot, SourceError>;
}

/// Maps parsed readings onto the catalog and builds a complete snapshot.
///
/// - keys with no catalog entry are logged and skipped
/// - several readings for the same region are OR-ed
/// - catalog regions without a reading default to inactive, with a warning
pub fn assemble_snapshot(
    readings: Vec<Reading>,
    key: RegionKey,
    fetched_at: DateTime<Utc>,
) -> StatusSnapshot {
    let mut statuses: HashMap<&'static str, bool> = HashMap::new();

    for reading in readings {
        let Some(region) = catalog::find(key, &reading.key) else {
            warn!("unknown region {:?} in source payload, skipping", reading.key);
            continue;
        };
        *statuses.entry(region.id).or_insert(false) |= reading.alert_active;
    }

    StatusSnapshot::from_catalog(fetched_at, |region| match statuses.get(region.id) {
        Some(alert_active) => *alert_active,
        None => {
            warn!(
                "region {} missing from source payload, assuming no alert",
                region.id
            );
            false
        }
    })
}
