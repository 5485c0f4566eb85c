//! Payload parsers, one per supported source format.
//!
//! Each parser turns a raw body into [`Reading`]s keyed by a [`RegionKey`].
//! Catalog matching is left to [`crate::source::assemble_snapshot`], so the
//! handling of unknown and missing regions is the same for every format.

mod active_alerts;
mod status_string;
mod svg_map;

use crate::catalog::RegionKey;
use crate::source::{Reading, SourceError, SourceFormat};

pub use crate::source::parsers::active_alerts::ActiveAlertsParser;
pub use crate::source::parsers::status_string::StatusStringParser;
pub use crate::source::parsers::svg_map::SvgMapParser;

/// Turns a raw payload into per-region readings.
///
/// A parser must either return readings for the whole payload or fail with
/// [`SourceError::Format`]; it never returns what it managed to read so far.
pub trait PayloadParser: Send + Sync {
    /// The kind of key the readings are identified by.
    fn key(&self) -> RegionKey;

    /// Parses `raw` into readings.
    fn parse(&self, raw: &str) -> Result<Vec<Reading>, SourceError>;
}

/// Returns the parser for the configured format.
pub fn parser_for(format: SourceFormat) -> Box<dyn PayloadParser> {
    match format {
        SourceFormat::StatusString => Box::new(StatusStringParser),
        SourceFormat::ActiveAlerts => Box::new(ActiveAlertsParser),
        SourceFormat::SvgMap => Box::new(SvgMapParser),
    }
}
