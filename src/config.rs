//! Configuration file structures and loading.
//!
//! The configuration is read from a YAML file and merged with environment
//! variables. It is split into four sections: the alert source, the
//! scheduler, the optional Telegram notifications and the HTTP server.
//!
//! # Configuration File Format
//!
//! ```yaml
//! source:
//!   # status_string | active_alerts | svg_map
//!   format: status_string
//!   url: "https://api.alerts.in.ua/v1/iot/active_air_raid_alerts_by_oblast.json"
//!   token: "your-api-token"
//!   request_timeout: 15
//!
//! scheduler:
//!   # Seconds between the end of an update and the next one, required
//!   update_interval: 60
//!   max_retries: 3
//!   base_delay: 1
//!   max_delay: 30
//!   max_failures: 5
//!
//! # Optional, transitions are only logged without it
//! telegram:
//!   token: "123456:bot-token"
//!   chat_id: "-1001234567890"
//!
//! server:
//!   host: "0.0.0.0"
//!   port: 8500
//! ```
//!
//! # Environment Variable Overrides
//!
//! Any value can be overridden with the `AIRALARM_` prefix, sections being
//! separated by a double underscore:
//!
//! ```bash
//! export AIRALARM_SOURCE__TOKEN="your-api-token"
//! export AIRALARM_TELEGRAM__TOKEN="123456:bot-token"
//! export AIRALARM_SCHEDULER__UPDATE_INTERVAL=30
//! ```
//!
//! `UPDATE_INTERVAL`, `REQUEST_TIMEOUT` and `MAX_RETRIES` are also accepted
//! without prefix. Prefixed variables win over them.

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use log::info;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::scheduler::RetryPolicy;
use crate::source::SourceFormat;

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file or the environment could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(String),
    /// A value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Alert source settings
    pub source: Source,
    /// Update loop settings
    pub scheduler: Scheduler,
    /// Telegram notifications, disabled when absent
    #[serde(default)]
    pub telegram: Option<Telegram>,
    /// HTTP server settings
    #[serde(default)]
    pub server: Server,
}

/// Alert source settings.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Source {
    /// Payload format served by `url`
    #[serde(default = "default_format")]
    pub format: SourceFormat,
    /// Endpoint returning the alert statuses
    pub url: String,
    /// Bearer token, if the endpoint needs one
    #[serde(default, deserialize_with = "optional_text")]
    pub token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Update loop settings.
///
/// All delays are in seconds.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Scheduler {
    /// Pause between the end of an update and the start of the next one.
    ///
    /// Deployments use anything from 30 seconds to 10 minutes, so there is
    /// no default.
    pub update_interval: u64,
    /// Fetch attempts per update
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay after the first failed attempt
    #[serde(default = "default_base_delay")]
    pub base_delay: u64,
    /// Upper bound of the backoff delay
    #[serde(default = "default_max_delay")]
    pub max_delay: u64,
    /// Consecutive failed updates before a system notice
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

/// Telegram notification settings.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Telegram {
    /// Bot token, `<bot id>:<secret>`
    pub token: String,
    /// Destination chat or channel id
    #[serde(deserialize_with = "text")]
    pub chat_id: String,
    /// Bot API base url
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    /// Deadline of a single message delivery, in seconds
    #[serde(default = "default_telegram_timeout")]
    pub timeout: u64,
}

/// HTTP server settings.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Server {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_format() -> SourceFormat {
    SourceFormat::StatusString
}

fn default_request_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1
}

fn default_max_delay() -> u64 {
    30
}

fn default_max_failures() -> u32 {
    5
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_timeout() -> u64 {
    10
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8500
}

/// Unprefixed environment variables and the keys they set.
const BARE_ENV_ALIASES: [(&str, &str); 3] = [
    ("UPDATE_INTERVAL", "scheduler.update_interval"),
    ("REQUEST_TIMEOUT", "source.request_timeout"),
    ("MAX_RETRIES", "scheduler.max_retries"),
];

impl Config {
    /// Loads and validates the configuration.
    ///
    /// A missing file is not an error as long as the environment provides
    /// every required value.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the YAML configuration file
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = Config::load("config.yaml")?;
    /// println!("updating every {}s", config.scheduler.update_interval);
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let mut figment = Figment::new().merge(Yaml::file(path));
        for (name, key) in BARE_ENV_ALIASES {
            figment = figment.merge(Env::raw().only(&[name]).map(move |_| key.into()));
        }
        figment = figment.merge(Env::prefixed("AIRALARM_").split("__"));

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;

        info!("configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Checks the values deserialization cannot enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Invalid(message.to_string()));

        if self.source.url.trim().is_empty() {
            return invalid("source.url must not be empty");
        }
        if self.source.request_timeout == 0 {
            return invalid("source.request_timeout must be positive");
        }

        let scheduler = &self.scheduler;
        if scheduler.update_interval == 0 {
            return invalid("scheduler.update_interval must be positive");
        }
        if scheduler.max_retries == 0 {
            return invalid("scheduler.max_retries must be at least 1");
        }
        if scheduler.base_delay == 0 {
            return invalid("scheduler.base_delay must be positive");
        }
        if scheduler.base_delay > scheduler.max_delay {
            return invalid("scheduler.base_delay must not exceed scheduler.max_delay");
        }
        if scheduler.max_failures == 0 {
            return invalid("scheduler.max_failures must be at least 1");
        }

        if let Some(telegram) = &self.telegram {
            let well_formed = telegram
                .token
                .split_once(':')
                .is_some_and(|(id, secret)| {
                    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty()
                });
            if !well_formed {
                return invalid("telegram.token must look like <bot id>:<secret>");
            }
            if telegram.chat_id.trim().is_empty() {
                return invalid("telegram.chat_id must not be empty");
            }
            if telegram.timeout == 0 {
                return invalid("telegram.timeout must be positive");
            }
        }

        if self.server.port == 0 {
            return invalid("server.port must not be 0");
        }

        Ok(())
    }
}

/// A value written as text or as a bare number.
///
/// figment parses environment values, so `-1001234567890` reaches serde as an
/// integer even for a field holding an identifier.
#[derive(Deserialize)]
#[serde(untagged)]
enum Text {
    Str(String),
    Int(i64),
    UInt(u64),
}

impl From<Text> for String {
    fn from(value: Text) -> Self {
        match value {
            Text::Str(s) => s,
            Text::Int(n) => n.to_string(),
            Text::UInt(n) => n.to_string(),
        }
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Text::deserialize(deserializer).map(String::from)
}

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Option::<Text>::deserialize(deserializer).map(|value| value.map(String::from))
}

impl Source {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Scheduler {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }

    /// Backoff settings of a single update.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs(self.base_delay),
            max_delay: Duration::from_secs(self.max_delay),
        }
    }
}

impl Telegram {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
