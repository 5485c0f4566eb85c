//! Airalarm - Air raid alert status service for the regions of Ukraine.
//!
//! Airalarm periodically retrieves the air raid alert status of every
//! first-level region of Ukraine from a third-party source, keeps the latest
//! snapshot in memory, serves it over a small HTTP API and optionally sends a
//! Telegram message whenever an alert starts or ends in a region.
//!
//! # Features
//!
//! - **Status API**: `GET /status` returns the alert status of all 27 regions
//! - **Region Search**: `GET /region/{query}` finds regions by name or id
//! - **Statistics**: `GET /stats` reports how many regions are under alert
//! - **Health Check**: `GET /health` reports the state of the synchronization
//! - **Metrics**: `GET /metrics` exposes Prometheus metrics
//! - **Telegram Notifications**: one message per region transition
//! - **Resilient Updates**: exponential backoff within an update, failed
//!   updates leave the last good snapshot in place
//! - **Several Source Formats**: alerts.in.ua status string, alerts.in.ua
//!   active alerts list, SVG map
//!
//! # Configuration
//!
//! Create a `config.yaml` file with your settings:
//!
//! ```yaml
//! source:
//!   format: status_string
//!   url: "https://api.alerts.in.ua/v1/iot/active_air_raid_alerts_by_oblast.json"
//!   token: "your-api-token"
//!
//! scheduler:
//!   update_interval: 60
//!
//! telegram:
//!   token: "123456:bot-token"
//!   chat_id: "-1001234567890"
//! ```
//!
//! See the [`config`] module for every available setting.
//!
//! # Environment Variable Overrides
//!
//! Override any configuration value using environment variables with the
//! `AIRALARM_` prefix:
//!
//! ```bash
//! export AIRALARM_SOURCE__TOKEN="your-api-token"
//! export AIRALARM_TELEGRAM__TOKEN="123456:bot-token"
//! export UPDATE_INTERVAL=30
//! ```
//!
//! # Usage
//!
//! ```bash
//! airalarm --config config.yaml
//! ```
//!
//! # Architecture
//!
//! - [`catalog`] - Static catalog of the tracked regions
//! - [`status`] - Immutable snapshots and the cache holding the current one
//! - [`source`] - Alert source client and payload parsers
//! - [`notify`] - Snapshot diffing, message formatting and Telegram delivery
//! - [`scheduler`] - Periodic update loop with retries and backoff
//! - [`server`] - HTTP API over the cache
//! - [`service`] - Wiring of the components and process lifecycle
//! - [`telemetry`] - Prometheus metrics
//! - [`config`] - YAML configuration with environment variable overrides
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)
//!   - Set to `debug` for verbose output, payloads included
//!   - Set to `warn` or `error` for minimal logging

use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::{config::Config, service::Service};

mod catalog;
mod config;
mod notify;
mod scheduler;
mod server;
mod service;
mod source;
mod status;
mod telemetry;

/// Command-line arguments.
///
/// # Examples
///
/// ```bash
/// airalarm --config /etc/airalarm/config.yaml
/// ```
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    ///
    /// A missing file is accepted when the environment provides every
    /// required value. See the [`config`] module for the expected format.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

/// Main entry point.
///
/// 1. **Logging Setup**: `info` level by default, overridable with `RUST_LOG`
/// 2. **Argument Parsing**: `clap`
/// 3. **Configuration Loading**: YAML file merged with the environment, then
///    validated. An invalid configuration exits with a failure code.
/// 4. **Service Execution**: scheduler and HTTP server run until SIGINT or
///    SIGTERM is received
#[tokio::main]
async fn main() -> ExitCode {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting airalarm {}...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let metrics = match telemetry::install() {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to install the metrics recorder: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let service = match Service::new(&config, metrics) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize service: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(token.clone()));

    match service.start(token).await {
        Ok(()) => {
            info!("airalarm stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Cancels `token` on the first SIGINT or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }

    token.cancel();
}
