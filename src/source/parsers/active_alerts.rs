//! Parser for the alerts.in.ua list of active alerts.
//!
//! ```text
//! {
//!   "alerts": [
//!     { "location_uid": "31", "location_type": "city", "alert_type": "air_raid" },
//!     { "location_uid": "564", "location_oblast_uid": 22, "alert_type": "air_raid" }
//!   ]
//! }
//! ```
//!
//! Alerts raised for a district or a community carry the uid of their region
//! in `location_oblast_uid`; those count for the whole region.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::catalog::{CATALOG, RegionKey};
use crate::source::parsers::PayloadParser;
use crate::source::{Reading, SourceError};

const AIR_RAID: &str = "air_raid";

#[derive(Deserialize, Debug)]
struct ActiveAlertsResponse {
    alerts: Vec<ActiveAlert>,
}

#[derive(Deserialize, Debug)]
struct ActiveAlert {
    location_uid: String,
    #[serde(default)]
    location_oblast_uid: Option<u32>,
    #[serde(default)]
    alert_type: Option<String>,
}

impl ActiveAlert {
    fn region_uid(&self) -> String {
        match self.location_oblast_uid {
            Some(uid) => uid.to_string(),
            None => self.location_uid.clone(),
        }
    }

    fn is_air_raid(&self) -> bool {
        self.alert_type.as_deref().is_none_or(|alert_type| alert_type == AIR_RAID)
    }
}

/// The list is exhaustive: a region without an alert in it is quiet, so
/// every catalog region gets a reading.
pub struct ActiveAlertsParser;

impl PayloadParser for ActiveAlertsParser {
    fn key(&self) -> RegionKey {
        RegionKey::Uid
    }

    fn parse(&self, raw: &str) -> Result<Vec<Reading>, SourceError> {
        let response: ActiveAlertsResponse = serde_json::from_str(raw)
            .map_err(|e| SourceError::Format(format!("invalid active alerts list: {}", e)))?;

        let active_uids: BTreeSet<String> = response
            .alerts
            .iter()
            .filter(|alert| alert.is_air_raid())
            .map(ActiveAlert::region_uid)
            .collect();

        let mut readings: Vec<Reading> = CATALOG
            .iter()
            .map(|region| Reading::new(region.uid, active_uids.contains(region.uid)))
            .collect();

        // Keep uids the catalog does not know so they get reported
        readings.extend(
            active_uids
                .iter()
                .filter(|uid| !CATALOG.iter().any(|region| region.uid == uid.as_str()))
                .map(|uid| Reading::new(uid.as_str(), true)),
        );

        Ok(readings)
    }
}
