//! Request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::catalog;
use crate::server::AppState;
use crate::status::StatusSnapshot;

/// `{ region_name: alert_active }`, in catalog order.
pub(super) struct StatusBody(Arc<StatusSnapshot>);

impl Serialize for StatusBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let regions = self.0.regions();
        let mut map = serializer.serialize_map(Some(regions.len()))?;
        for status in regions {
            map.serialize_entry(status.name, &status.alert_active)?;
        }
        map.end()
    }
}

#[derive(Serialize, Debug)]
pub(super) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    source: SourceHealth,
}

#[derive(Serialize, Debug)]
struct SourceHealth {
    /// `unknown` before the first update, `degraded` while updates fail
    state: &'static str,
    last_update: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    last_error: Option<String>,
}

#[derive(Serialize, Debug)]
struct RegionMatch {
    id: &'static str,
    name: &'static str,
    alert_active: bool,
}

#[derive(Serialize, Debug)]
pub(super) struct RegionSearchResponse {
    query: String,
    found_count: usize,
    regions: Vec<RegionMatch>,
    last_update: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug)]
pub(super) struct StatsResponse {
    total_regions: usize,
    active_alerts: usize,
    inactive_regions: usize,
    alert_percentage: f64,
    last_update: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
}

fn error_response(status: StatusCode, error: &'static str, query: Option<String>) -> Response {
    (status, Json(ErrorResponse { error, query })).into_response()
}

pub(super) async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusBody> {
    Json(StatusBody(state.cache.get()))
}

pub(super) async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.cache.get();
    let consecutive_failures = state.health.consecutive_failures();

    let source_state = if consecutive_failures > 0 {
        "degraded"
    } else if snapshot.is_verified() {
        "ok"
    } else {
        "unknown"
    };

    Json(HealthResponse {
        status: "ok",
        version: state.version,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        source: SourceHealth {
            state: source_state,
            last_update: snapshot.fetched_at(),
            consecutive_failures,
            last_error: state.health.last_error(),
        },
    })
}

pub(super) async fn get_region(
    State(state): State<Arc<AppState>>,
    Path(query): Path<String>,
) -> Response {
    let regions = catalog::search(&query);
    if regions.is_empty() {
        warn!("no region matches {:?}", query);
        return error_response(StatusCode::NOT_FOUND, "region not found", Some(query));
    }

    let snapshot = state.cache.get();
    let regions: Vec<_> = regions
        .into_iter()
        .map(|region| RegionMatch {
            id: region.id,
            name: region.name,
            alert_active: snapshot.get(region.id).is_some_and(|s| s.alert_active),
        })
        .collect();
    debug!("region search {:?}: {} matches", query, regions.len());

    Json(RegionSearchResponse {
        query,
        found_count: regions.len(),
        regions,
        last_update: snapshot.fetched_at(),
    })
    .into_response()
}

pub(super) async fn get_stats(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.cache.get();
    let Some(last_update) = snapshot.fetched_at() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "status not loaded yet",
            None,
        );
    };

    let total_regions = snapshot.regions().len();
    let active_alerts = snapshot.active_count();
    let alert_percentage = if total_regions == 0 {
        0.0
    } else {
        (active_alerts as f64 * 10_000.0 / total_regions as f64).round() / 100.0
    };

    Json(StatsResponse {
        total_regions,
        active_alerts,
        inactive_regions: total_regions - active_alerts,
        alert_percentage,
        last_update,
    })
    .into_response()
}

/// Prometheus text exposition of the recorded metrics.
pub(super) async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::catalog::CATALOG;
    use crate::notify::{MockNotifier, Reconciler};
    use crate::scheduler::{RetryPolicy, Scheduler, SyncHealth};
    use crate::server::router;
    use crate::source::{MockAlertSource, SourceError};
    use crate::status::StatusCache;
    use crate::telemetry;

    use super::*;

    fn state_with(metrics: PrometheusHandle) -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(StatusCache::new()),
            Arc::new(SyncHealth::new()),
            metrics,
        ))
    }

    fn state() -> Arc<AppState> {
        state_with(PrometheusBuilder::new().build_recorder().handle())
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, String) {
        let response = router(Arc::clone(state))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn fetched_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_status_lists_every_region_in_catalog_order() {
        let state = state();
        state.cache.replace(StatusSnapshot::from_catalog(fetched_at(), |r| {
            r.id == "lviv" || r.id == "kyiv_city"
        }));

        let (status, body) = get(&state, "/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        let map = json.as_object().unwrap();
        assert_eq!(map.len(), CATALOG.len());
        assert_eq!(map["Львівська область"], Value::Bool(true));
        assert_eq!(map["м. Київ"], Value::Bool(true));
        assert_eq!(map["Одеська область"], Value::Bool(false));

        let positions: Vec<_> = CATALOG
            .iter()
            .map(|region| body.find(&format!("\"{}\"", region.name)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_status_before_first_update() {
        let state = state();

        let (status, body) = get(&state, "/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert!(json.as_object().unwrap().values().all(|v| v == false));
    }

    #[tokio::test]
    async fn test_health_states() {
        let state = state();

        let (status, body) = get(&state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["source"]["state"], "unknown");
        assert_eq!(json["source"]["last_update"], Value::Null);

        state
            .cache
            .replace(StatusSnapshot::from_catalog(fetched_at(), |_| false));
        state.health.record_success();
        let (_, body) = get(&state, "/health").await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["source"]["state"], "ok");
        assert_eq!(json["source"]["last_update"], "2024-03-01T10:00:00Z");

        state.health.record_failure("alert source unavailable: timeout");
        let (status, body) = get(&state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["source"]["state"], "degraded");
        assert_eq!(json["source"]["consecutive_failures"], 1);
        assert_eq!(
            json["source"]["last_error"],
            "alert source unavailable: timeout"
        );
    }

    #[tokio::test]
    async fn test_region_search() {
        let state = state();
        state
            .cache
            .replace(StatusSnapshot::from_catalog(fetched_at(), |r| r.id == "kyiv"));

        // "київ", percent-encoded
        let (status, body) = get(&state, "/region/%D0%BA%D0%B8%D1%97%D0%B2").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["query"], "київ");
        assert_eq!(json["found_count"], 2);
        assert_eq!(json["regions"][0]["id"], "kyiv_city");
        assert_eq!(json["regions"][0]["alert_active"], false);
        assert_eq!(json["regions"][1]["id"], "kyiv");
        assert_eq!(json["regions"][1]["alert_active"], true);
    }

    #[tokio::test]
    async fn test_region_search_by_id() {
        let state = state();

        let (status, body) = get(&state, "/region/LVIV").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["found_count"], 1);
        assert_eq!(json["regions"][0]["name"], "Львівська область");
    }

    #[tokio::test]
    async fn test_region_not_found() {
        let state = state();

        let (status, body) = get(&state, "/region/atlantis").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "region not found");
        assert_eq!(json["query"], "atlantis");
    }

    #[tokio::test]
    async fn test_stats() {
        let state = state();

        let (status, body) = get(&state, "/stats").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "status not loaded yet");

        state.cache.replace(StatusSnapshot::from_catalog(fetched_at(), |r| {
            ["kharkiv", "sumy", "donetsk"].contains(&r.id)
        }));

        let (status, body) = get(&state, "/stats").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["total_regions"], 27);
        assert_eq!(json["active_alerts"], 3);
        assert_eq!(json["inactive_regions"], 24);
        assert_eq!(json["alert_percentage"], 11.11);
        assert_eq!(json["last_update"], "2024-03-01T10:00:00Z");
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let state = state_with(recorder.handle());
        let snapshot = StatusSnapshot::from_catalog(fetched_at(), |r| {
            ["kharkiv", "sumy", "donetsk"].contains(&r.id)
        });
        metrics::with_local_recorder(&recorder, || telemetry::record_snapshot(&snapshot));

        let response = router(Arc::clone(&state))
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(telemetry::sample(&body, "airalarm_active_alerts"), Some(3.0));
        assert_eq!(telemetry::sample(&body, "airalarm_inactive_regions"), Some(24.0));
    }

    #[tokio::test]
    async fn test_metrics_count_ticks() {
        let state = state_with(telemetry::global_handle());

        let mut source = MockAlertSource::new();
        let mut calls = 0;
        source.expect_fetch().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(StatusSnapshot::from_catalog(fetched_at(), |r| r.id == "kyiv"))
            } else {
                Err(SourceError::Format("unexpected payload".to_owned()))
            }
        });
        let scheduler = Scheduler::new(
            source,
            Reconciler::<MockNotifier>::log_only(),
            Arc::clone(&state.cache),
            Arc::clone(&state.health),
            RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(1),
            },
            Duration::from_secs(60),
            5,
        );
        let token = CancellationToken::new();
        scheduler.tick(&token).await;
        scheduler.tick(&token).await;

        let (status, body) = get(&state, "/metrics").await;
        assert_eq!(status, StatusCode::OK);

        let at_least_one = |series: &str| {
            telemetry::sample(&body, series).is_some_and(|value| value >= 1.0)
        };
        assert!(at_least_one(r#"airalarm_updates_total{outcome="updated"}"#));
        assert!(at_least_one(r#"airalarm_updates_total{outcome="skipped"}"#));
        assert!(at_least_one(r#"airalarm_source_requests_total{outcome="success"}"#));
        assert!(at_least_one(r#"airalarm_source_requests_total{outcome="format"}"#));
        assert!(body.contains("airalarm_update_duration_seconds"));
        assert!(body.contains("airalarm_region_alert_active{region=\"kyiv\"}"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = get(&state(), "/alerts").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
