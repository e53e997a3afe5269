//! Network sink for event batches and metric beacons.

use crate::retry::{retry, Retryable, RetryPolicy};
use crate::telemetry::config::TelemetryConfig;
use crate::telemetry::event::Event;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Header carrying the shared ingest token.
pub const INGEST_TOKEN_HEADER: &str = "x-ingest-token";

/// Body of every batch POST.
#[derive(Debug, Serialize)]
struct EventBatch<'a> {
    events: &'a [Event],
}

/// One performance measurement, as sent to the metrics endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPayload {
    pub metric: String,
    pub value: f64,
    pub timestamp: i64,
    pub url: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ingestion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Server errors, rate limiting and connection failures are worth another
/// attempt. Other client errors are not.
impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            TransportError::Request(e) => e.is_timeout() || e.is_connect(),
            TransportError::Status { status, .. } => *status >= 500 || *status == 429,
            TransportError::Unavailable(_) => false,
        }
    }
}

/// Where batches go.
pub trait Transport: Send + Sync {
    fn send_events<'a>(&'a self, events: &'a [Event]) -> BoxFuture<'a, Result<(), TransportError>>;

    fn send_metric<'a>(
        &'a self,
        metric: &'a MetricPayload,
    ) -> BoxFuture<'a, Result<(), TransportError>>;
}

/// JSON-over-HTTP transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    events_path: String,
    metrics_path: String,
    ingest_token: Option<String>,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        events_path: impl Into<String>,
        metrics_path: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            events_path: events_path.into(),
            metrics_path: metrics_path.into(),
            ingest_token: None,
            retry: RetryPolicy::event_batch(),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(
            &config.base_url,
            &config.endpoints.events,
            &config.metrics_endpoint,
        )
        .with_ingest_token(config.ingest_token.clone())
    }

    /// Token sent in `x-ingest-token` on every request. Empty means none.
    pub fn with_ingest_token(mut self, token: Option<String>) -> Self {
        self.ingest_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<(), TransportError> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.ingest_token {
            request = request.header(INGEST_TOKEN_HEADER, token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

impl Transport for HttpTransport {
    fn send_events<'a>(&'a self, events: &'a [Event]) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            let url = self.url(&self.events_path);
            let body = EventBatch { events };

            retry(&self.retry, "send_events", || self.post_json(&url, &body)).await?;

            debug!("Delivered {} events to {}", events.len(), url);
            Ok(())
        })
    }

    fn send_metric<'a>(
        &'a self,
        metric: &'a MetricPayload,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            let url = self.url(&self.metrics_path);
            retry(&RetryPolicy::metric_beacon(), "send_metric", || {
                self.post_json(&url, metric)
            })
            .await
        })
    }
}
