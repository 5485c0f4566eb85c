//! Alert source backed by an HTTP endpoint and a payload parser.

use chrono::Utc;
use log::{debug, info};

use crate::source::parsers::PayloadParser;
use crate::source::requester::Requester;
use crate::source::{AlertSource, SourceError, assemble_snapshot};
use crate::status::StatusSnapshot;

/// Fetches the payload with a [`Requester`] and parses it with the
/// [`PayloadParser`] selected by configuration.
///
/// # Examples
///
/// ```ignore
/// let requester = AlertsRequester::new(&url, None, Duration::from_secs(15))?;
/// let source = HttpAlertSource::new(requester, parser_for(SourceFormat::StatusString));
/// let snapshot = source.fetch().await?;
/// ```
pub struct HttpAlertSource<R: Requester> {
    requester: R,
    parser: Box<dyn PayloadParser>,
}

impl<R: Requester> HttpAlertSource<R> {
    pub fn new(requester: R, parser: Box<dyn PayloadParser>) -> Self {
        HttpAlertSource { requester, parser }
    }
}

impl<R: Requester> AlertSource for HttpAlertSource<R> {
    async fn fetch(&self) -> Result<StatusSnapshot, SourceError> {
        let raw = self.requester.fetch_payload().await?;
        let readings = self.parser.parse(&raw)?;
        debug!("parsed {} readings", readings.len());

        let snapshot = assemble_snapshot(readings, self.parser.key(), Utc::now());
        info!("fetched alert statuses: {}", snapshot);

        Ok(snapshot)
    }
}
