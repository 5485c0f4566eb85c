//! Service wiring and lifecycle.
//!
//! [`Service`] builds every component from the configuration and runs the
//! two long-lived tasks of the process:
//!
//! 1. **Scheduler Task**: fetches the alert statuses every `update_interval`
//!    seconds, updates the cache and sends the notifications
//! 2. **HTTP Task**: serves the cache on `server.host:server.port`
//!
//! Both stop when the shared cancellation token is cancelled. A failure of
//! the HTTP server cancels the token too, so the process never keeps
//! updating a cache nobody can read.

use std::sync::Arc;

use anyhow::Context;
use log::{error, info};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{self, Config};
use crate::notify::{Reconciler, TelegramNotifier};
use crate::scheduler::{Scheduler, SyncHealth};
use crate::server::{self, AppState};
use crate::source::{AlertsRequester, HttpAlertSource, parser_for};
use crate::status::StatusCache;

type AlertScheduler = Scheduler<HttpAlertSource<AlertsRequester>, TelegramNotifier>;

/// The assembled air alert service.
///
/// # Examples
///
/// ```ignore
/// let config = Config::load("config.yaml")?;
/// let token = CancellationToken::new();
///
/// let service = Service::new(&config, telemetry::install()?)?;
/// service.start(token).await?; // Runs until the token is cancelled
/// ```
pub struct Service {
    /// Update loop, moved into its own task on start
    scheduler: AlertScheduler,
    /// State shared with the HTTP handlers
    state: Arc<AppState>,
    /// Where to serve the HTTP facade
    server: config::Server,
}

impl Service {
    /// Creates every component from the configuration.
    ///
    /// Nothing touches the network before [`Service::start`].
    ///
    /// # Errors
    ///
    /// Fails if an HTTP client cannot be built, e.g. when no TLS backend is
    /// available.
    pub fn new(config: &Config, metrics: PrometheusHandle) -> anyhow::Result<Self> {
        let cache = Arc::new(StatusCache::new());
        let health = Arc::new(SyncHealth::new());

        let requester = AlertsRequester::new(
            &config.source.url,
            config.source.token.as_deref(),
            config.source.request_timeout(),
        )
        .context("failed to create the alert source client")?;
        let source = HttpAlertSource::new(requester, parser_for(config.source.format));
        info!(
            "alert source {} ({:?} format)",
            &config.source.url, config.source.format
        );

        let reconciler = match &config.telegram {
            Some(telegram) => {
                let notifier = TelegramNotifier::new(
                    &telegram.api_url,
                    &telegram.token,
                    &telegram.chat_id,
                    telegram.timeout(),
                )
                .context("failed to create the telegram client")?;
                info!("telegram notifications sent to chat {}", &telegram.chat_id);
                Reconciler::new(notifier, telegram.timeout())
            }
            None => {
                info!("telegram not configured, transitions are only logged");
                Reconciler::log_only()
            }
        };

        let scheduler = Scheduler::new(
            source,
            reconciler,
            Arc::clone(&cache),
            Arc::clone(&health),
            config.scheduler.retry_policy(),
            config.scheduler.update_interval(),
            config.scheduler.max_failures,
        );

        Ok(Service {
            scheduler,
            state: Arc::new(AppState::new(cache, health, metrics)),
            server: config.server.clone(),
        })
    }

    /// Runs the scheduler and the HTTP server until `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the HTTP server error, e.g. when the port is already in use.
    /// The scheduler is stopped before returning.
    pub async fn start(self, token: CancellationToken) -> anyhow::Result<()> {
        let scheduler_task = tokio::spawn(self.scheduler.run(token.clone()));

        let served = server::serve(
            &self.server.host,
            self.server.port,
            self.state,
            token.clone(),
        )
        .await;

        token.cancel();
        if let Err(e) = scheduler_task.await {
            error!("scheduler task failed: {}", e);
        }

        served
    }
}
