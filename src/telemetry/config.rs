use std::time::Duration;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(30_000);
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50;
pub const DEFAULT_MAX_BUFFERED_EVENTS: usize = 1_000;
pub const DEFAULT_SCROLL_THROTTLE: Duration = Duration::from_millis(250);

/// Batch ingestion paths, relative to the base URL.
///
/// `HttpTransport` posts every batch to `events`. The collector also mounts
/// `performance` and `errors`, which take the same `{ events }` body, for
/// hosts that route those categories separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub events: String,
    /// Collector-side route only
    pub performance: String,
    /// Collector-side route only
    pub errors: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            events: "/api/analytics/events".to_string(),
            performance: "/api/analytics/performance".to_string(),
            errors: "/api/analytics/errors".to_string(),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Click, scroll, form and visibility tracking
    pub enable_auto_tracking: bool,
    /// Long tasks, slow resources and Web Vitals
    pub enable_performance_tracking: bool,
    /// Script errors and unhandled rejections
    pub enable_error_tracking: bool,
    pub enable_heatmaps: bool,

    /// Fraction of `track` calls that are recorded, in `[0, 1]`
    pub sample_rate: f64,
    pub flush_interval: Duration,
    /// Queue length that triggers an eager flush
    pub max_queue_size: usize,
    /// Upper bound on the queue when failed batches are put back
    pub max_buffered_events: usize,
    pub scroll_throttle: Duration,

    pub base_url: String,
    pub endpoints: Endpoints,
    pub metrics_endpoint: String,
    /// Sent as `x-ingest-token` on every request when set
    pub ingest_token: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable_auto_tracking: true,
            enable_performance_tracking: true,
            enable_error_tracking: true,
            enable_heatmaps: false,
            sample_rate: 1.0,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_buffered_events: DEFAULT_MAX_BUFFERED_EVENTS,
            scroll_throttle: DEFAULT_SCROLL_THROTTLE,
            base_url: "http://localhost:3000".to_string(),
            endpoints: Endpoints::default(),
            metrics_endpoint: "/api/metrics".to_string(),
            ingest_token: None,
        }
    }
}

impl TelemetryConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the sample rate, clamped to `[0, 1]`.
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = clamp_sample_rate(rate);
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_max_buffered_events(mut self, max: usize) -> Self {
        self.max_buffered_events = max;
        self
    }

    /// An empty token counts as none.
    pub fn with_ingest_token(mut self, token: Option<String>) -> Self {
        self.ingest_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_heatmaps(mut self, enabled: bool) -> Self {
        self.enable_heatmaps = enabled;
        self
    }

    /// Turn every instrumentation block off; only explicit `track` calls
    /// produce events.
    pub fn without_instrumentation(mut self) -> Self {
        self.enable_auto_tracking = false;
        self.enable_performance_tracking = false;
        self.enable_error_tracking = false;
        self.enable_heatmaps = false;
        self
    }
}

/// NaN counts as "record nothing".
pub fn clamp_sample_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.sample_rate, 1.0);
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert_eq!(config.max_queue_size, 50);
        assert_eq!(config.max_buffered_events, 1000);
        assert_eq!(config.endpoints.events, "/api/analytics/events");
        assert_eq!(config.metrics_endpoint, "/api/metrics");
        assert!(config.enable_auto_tracking);
        assert!(!config.enable_heatmaps);
        assert_eq!(config.ingest_token, None);
    }

    #[test]
    fn test_empty_ingest_token_is_none() {
        let config = TelemetryConfig::default().with_ingest_token(Some(String::new()));
        assert_eq!(config.ingest_token, None);

        let config = config.with_ingest_token(Some("s3cret".to_string()));
        assert_eq!(config.ingest_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_sample_rate_is_clamped() {
        assert_eq!(TelemetryConfig::default().with_sample_rate(1.7).sample_rate, 1.0);
        assert_eq!(TelemetryConfig::default().with_sample_rate(-0.2).sample_rate, 0.0);
        assert_eq!(TelemetryConfig::default().with_sample_rate(0.3).sample_rate, 0.3);
        assert_eq!(clamp_sample_rate(f64::NAN), 0.0);
    }

    #[test]
    fn test_without_instrumentation() {
        let config = TelemetryConfig::default()
            .with_heatmaps(true)
            .without_instrumentation();
        assert!(!config.enable_auto_tracking);
        assert!(!config.enable_performance_tracking);
        assert!(!config.enable_error_tracking);
        assert!(!config.enable_heatmaps);
    }
}
