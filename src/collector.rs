//! Development ingestion service.
//!
//! Accepts the batches and beacons the telemetry pipeline and performance
//! monitor send, logs them and keeps counters. Nothing is persisted.

use crate::security::ingest_token_matches;
use crate::telemetry::{Category, Endpoints, Event, MetricPayload};

pub use crate::telemetry::INGEST_TOKEN_HEADER;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub const STATS_PATH: &str = "/api/analytics/stats";

#[derive(Debug, Deserialize)]
pub struct IngestBatch {
    pub events: Vec<Event>,
}

/// Running totals since startup.
#[derive(Debug, Default)]
pub struct CollectorStats {
    batches: AtomicU64,
    events: AtomicU64,
    metrics: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub batches: u64,
    pub events: u64,
    pub metrics: u64,
    pub rejected: u64,
}

impl CollectorStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            metrics: self.metrics.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorState {
    stats: Arc<CollectorStats>,
    ingest_token: Option<Arc<str>>,
}

impl CollectorState {
    pub fn new(ingest_token: Option<String>) -> Self {
        Self {
            stats: Arc::new(CollectorStats::default()),
            ingest_token: ingest_token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }

    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), StatusCode> {
        let provided = headers
            .get(INGEST_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());

        if ingest_token_matches(self.ingest_token.as_deref(), provided) {
            Ok(())
        } else {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("Rejected ingestion request with missing or invalid token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Build the collector router.
///
/// The three batch endpoints must be distinct paths.
pub fn router(state: CollectorState, endpoints: &Endpoints, metrics_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(&endpoints.events, post(ingest_events))
        .route(&endpoints.performance, post(ingest_events))
        .route(&endpoints.errors, post(ingest_events))
        .route(metrics_path, post(ingest_metric))
        .route(STATS_PATH, get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn ingest_events(
    State(state): State<CollectorState>,
    headers: HeaderMap,
    Json(batch): Json<IngestBatch>,
) -> Result<StatusCode, StatusCode> {
    state.authorize(&headers)?;

    let count = batch.events.len() as u64;
    state.stats.batches.fetch_add(1, Ordering::Relaxed);
    state.stats.events.fetch_add(count, Ordering::Relaxed);

    for event in &batch.events {
        debug!(
            "Event '{}' ({}) session={} path={}",
            event.name, event.category, event.session_id, event.context.page.path
        );
        if event.category == Category::Error {
            warn!(
                "Client error reported: {} {}",
                event.name,
                serde_json::Value::Object(event.properties.clone())
            );
        }
    }
    info!("Received batch of {} events", count);

    Ok(StatusCode::NO_CONTENT)
}

async fn ingest_metric(
    State(state): State<CollectorState>,
    headers: HeaderMap,
    Json(metric): Json<MetricPayload>,
) -> Result<StatusCode, StatusCode> {
    state.authorize(&headers)?;

    state.stats.metrics.fetch_add(1, Ordering::Relaxed);
    info!("Metric {} = {} ({})", metric.metric, metric.value, metric.url);

    Ok(StatusCode::NO_CONTENT)
}

async fn stats(State(state): State<CollectorState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ignores_empty_token() {
        let state = CollectorState::new(Some(String::new()));
        assert!(state.authorize(&HeaderMap::new()).is_ok());
    }

    #[test]
    fn test_authorize_checks_header() {
        let state = CollectorState::new(Some("s3cret".to_string()));

        let mut headers = HeaderMap::new();
        assert_eq!(state.authorize(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(INGEST_TOKEN_HEADER, "wrong".parse().unwrap());
        assert_eq!(state.authorize(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(INGEST_TOKEN_HEADER, "s3cret".parse().unwrap());
        assert!(state.authorize(&headers).is_ok());

        assert_eq!(state.stats().snapshot().rejected, 2);
    }

    #[test]
    fn test_stats_start_at_zero() {
        let state = CollectorState::new(None);
        assert_eq!(
            state.stats().snapshot(),
            StatsSnapshot {
                batches: 0,
                events: 0,
                metrics: 0,
                rejected: 0,
            }
        );
    }

    #[test]
    fn test_ingest_batch_deserializes_wire_format() {
        let json = serde_json::json!({
            "events": [{
                "id": "e1",
                "name": "add_to_cart",
                "category": "business",
                "timestamp": 1_700_000_000_000i64,
                "sessionId": "s1",
                "properties": { "sku": "trench-01" },
                "context": {
                    "page": { "url": "https://shop.example/", "title": "", "path": "/", "referrer": "" },
                    "user": { "isAuthenticated": false, "segments": [] },
                    "session": { "id": "s1", "isFirstSession": true, "duration": 0, "pageViews": 1, "eventCount": 0 },
                    "device": { "type": "mobile", "os": "iOS", "browser": "Safari", "screenResolution": "390x844", "viewport": "390x664" }
                }
            }]
        });

        let batch: IngestBatch = serde_json::from_value(json).expect("Should deserialize");
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].name, "add_to_cart");
        assert_eq!(batch.events[0].user_id, None);
    }
}
