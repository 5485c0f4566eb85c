//! Telegram Bot API transport.

use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::notify::{Notifier, NotifyError};

/// Body of a `sendMessage` call.
#[derive(Serialize, Debug)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

/// Envelope of every Bot API reply.
#[derive(Deserialize, Debug)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends notifications to one Telegram chat through a bot.
///
/// # Examples
///
/// ```ignore
/// let notifier = TelegramNotifier::new(
///     "https://api.telegram.org",
///     "123456:bot-token",
///     "-1001234567890",
///     Duration::from_secs(10),
/// )?;
/// notifier.send("<b>hello</b>").await?;
/// ```
pub struct TelegramNotifier {
    /// `{api_url}/bot{token}/sendMessage`
    send_url: String,
    /// Destination chat
    chat_id: String,
    /// HTTP client, carrying the request timeout
    client: Client,
}

impl TelegramNotifier {
    /// Create a new [TelegramNotifier].
    ///
    /// # Arguments
    ///
    /// * `api_url` - Bot API base url, without trailing slash
    /// * `token` - Bot token
    /// * `chat_id` - Destination chat id
    /// * `timeout` - Upper bound for one request
    pub fn new(
        api_url: &str,
        token: &str,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(TelegramNotifier {
            send_url: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), token),
            chat_id: chat_id.to_string(),
            client,
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        debug!("send telegram message to chat {}: {}", &self.chat_id, message);

        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&self.send_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        // The Bot API explains failures in the body, even on error statuses
        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::Transport(format!("status {}: {}", status, e)))?;

        if !status.is_success() || !api_response.ok {
            return Err(NotifyError::Rejected(
                api_response
                    .description
                    .unwrap_or_else(|| format!("status {}", status)),
            ));
        }

        info!("telegram message sent to chat {}", &self.chat_id);
        Ok(())
    }
}
