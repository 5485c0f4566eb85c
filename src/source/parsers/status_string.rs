//! Parser for the alerts.in.ua IoT "by oblast" status string.
//!
//! The endpoint answers with a JSON string holding one character per region,
//! in catalog order:
//!
//! ```text
//! "ANNNNNNNNNNNNNNNNNNNNNNNNNN"
//! ```
//!
//! - `A`: alert active in the whole region
//! - `P`: alert active in part of the region
//! - `N`: no alert

use log::warn;

use crate::catalog::{CATALOG, RegionKey};
use crate::source::parsers::PayloadParser;
use crate::source::{Reading, SourceError};

pub struct StatusStringParser;

impl StatusStringParser {
    /// Strips the JSON string quoting, if any.
    fn unquote(raw: &str) -> Result<String, SourceError> {
        let raw = raw.trim();
        if raw.starts_with('"') {
            serde_json::from_str::<String>(raw)
                .map_err(|e| SourceError::Format(format!("invalid status string: {}", e)))
        } else {
            Ok(raw.to_owned())
        }
    }
}

impl PayloadParser for StatusStringParser {
    fn key(&self) -> RegionKey {
        RegionKey::Uid
    }

    fn parse(&self, raw: &str) -> Result<Vec<Reading>, SourceError> {
        let statuses = Self::unquote(raw)?;
        if statuses.is_empty() {
            return Err(SourceError::Format("empty status string".to_owned()));
        }

        let mut readings = Vec::with_capacity(CATALOG.len());
        for (region, (position, status)) in CATALOG.iter().zip(statuses.chars().enumerate()) {
            let alert_active = match status.to_ascii_uppercase() {
                'A' | 'P' => true,
                'N' => false,
                other => {
                    return Err(SourceError::Format(format!(
                        "unexpected status {:?} at position {}",
                        other, position
                    )));
                }
            };

            readings.push(Reading::new(region.uid, alert_active));
        }

        if statuses.chars().count() > CATALOG.len() {
            warn!(
                "status string has {} positions for {} known regions, ignoring the extra ones",
                statuses.chars().count(),
                CATALOG.len()
            );
        }

        Ok(readings)
    }
}
