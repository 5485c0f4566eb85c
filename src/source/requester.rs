//! HTTP client for the alert source endpoint.
//!
//! This module provides the [`AlertsRequester`] struct for retrieving the raw
//! alert payload. It does not interpret the body; see the `parsers` module.

use std::time::Duration;

use log::{debug, info};
use mockall::automock;
use reqwest::Client;

use crate::source::SourceError;

/// HTTP client requesting the alert payload from the configured endpoint.
///
/// # Examples
///
/// ```ignore
/// let requester = AlertsRequester::new(
///     "https://api.alerts.in.ua/v1/iot/active_air_raid_alerts_by_oblast.json",
///     Some("token"),
///     Duration::from_secs(15),
/// )?;
/// let body = requester.fetch_payload().await?;
/// ```
pub struct AlertsRequester {
    /// Alert source endpoint
    url: String,
    /// Optional bearer token
    token: Option<String>,
    /// HTTP client, carrying the request timeout
    client: Client,
}

/// Trait for retrieving the raw alert payload.
///
/// This trait abstracts the HTTP operations for easier testing with mocks.
#[automock]
pub trait Requester {
    /// Fetches the payload body as text.
    async fn fetch_payload(&self) -> Result<String, SourceError>;
}

impl AlertsRequester {
    /// Create a new [AlertsRequester].
    ///
    /// # Arguments
    ///
    /// * `url` - The alert source endpoint.
    /// * `token` - Bearer token sent in the `Authorization` header, if any.
    /// * `timeout` - Upper bound for the whole request.
    pub fn new(url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("airalarm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(AlertsRequester {
            url: url.to_string(),
            token: token.map(str::to_string),
            client,
        })
    }
}

impl Requester for AlertsRequester {
    /// Request the configured url and return the body.
    ///
    /// Transport errors, timeouts and non-success statuses all map to
    /// [`SourceError::Unavailable`].
    async fn fetch_payload(&self) -> Result<String, SourceError> {
        info!("request alert statuses");
        debug!("request {}", &self.url);

        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let body = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| SourceError::Unavailable(e.to_string()))?
            .text()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        debug!("response from {} -> {}", &self.url, &body);

        Ok(body)
    }
}
