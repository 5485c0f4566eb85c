//! HTTP facade over the status cache.
//!
//! Handlers only read the cache and the sync health, so a request never
//! waits on a fetch and never triggers one.
//!
//! # Endpoints
//!
//! - `GET /status` - alert status of every region, keyed by region name
//! - `GET /health` - liveness and state of the synchronization
//! - `GET /region/{query}` - regions whose name or id contains `query`
//! - `GET /stats` - active and inactive region counts
//! - `GET /metrics` - Prometheus metrics

mod routes;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{Router, routing::get};
use log::info;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::scheduler::SyncHealth;
use crate::status::StatusCache;

/// State shared by every handler.
pub struct AppState {
    /// Snapshot holder, written by the scheduler
    pub cache: Arc<StatusCache>,
    /// Outcome of the recent ticks
    pub health: Arc<SyncHealth>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
    pub version: &'static str,
    /// Renders the recorded metrics
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(cache: Arc<StatusCache>, health: Arc<SyncHealth>, metrics: PrometheusHandle) -> Self {
        AppState {
            cache,
            health,
            metrics,
            started_at: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(routes::get_status))
        .route("/health", get(routes::get_health))
        .route("/region/:query", get(routes::get_region))
        .route("/stats", get(routes::get_stats))
        .route("/metrics", get(routes::get_metrics))
        .with_state(state)
}

/// Serves the router on `host:port` until `token` is cancelled.
///
/// # Arguments
///
/// * `host` - Interface to bind, e.g. `0.0.0.0`
/// * `port` - TCP port to bind
/// * `state` - State shared by the handlers
/// * `token` - Cancelled on shutdown, in-flight requests are completed
pub async fn serve(
    host: &str,
    port: u16,
    state: Arc<AppState>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {}:{}", host, port))?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(token.cancelled_owned())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}
