//! Performance metric beacons.
//!
//! Each measurement is posted on its own to the metrics endpoint. Unlike
//! telemetry events there is no queue: a beacon that fails is logged and
//! dropped.

use crate::telemetry::{Clock, Environment, MetricPayload, Transport, TransportError};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Web Vitals rating bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs-improvement",
            Rating::Poor => "poor",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (good up to, poor above) for the metrics that have published thresholds
fn thresholds(metric: &str) -> Option<(f64, f64)> {
    match metric {
        "LCP" => Some((2_500.0, 4_000.0)),
        "FID" => Some((100.0, 300.0)),
        "CLS" => Some((0.1, 0.25)),
        "FCP" => Some((1_800.0, 3_000.0)),
        "TTFB" => Some((800.0, 1_800.0)),
        _ => None,
    }
}

/// Rate a measurement, or `None` for metrics without thresholds.
pub fn rate(metric: &str, value: f64) -> Option<Rating> {
    let (good, poor) = thresholds(metric)?;
    Some(if value <= good {
        Rating::Good
    } else if value <= poor {
        Rating::NeedsImprovement
    } else {
        Rating::Poor
    })
}

/// Navigation timing marks, in milliseconds from navigation start.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NavigationTiming {
    pub request_start: f64,
    pub response_start: f64,
    pub dom_content_loaded_event_start: f64,
    pub dom_content_loaded_event_end: f64,
    pub load_event_start: f64,
    pub load_event_end: f64,
}

impl NavigationTiming {
    /// The derived metrics reported for a page load.
    pub fn metrics(&self) -> [(&'static str, f64); 3] {
        [
            ("TTFB", self.response_start - self.request_start),
            (
                "DOMContentLoaded",
                self.dom_content_loaded_event_end - self.dom_content_loaded_event_start,
            ),
            ("LoadComplete", self.load_event_end - self.load_event_start),
        ]
    }
}

pub struct PerformanceMonitor {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    environment: Arc<dyn Environment>,
}

impl PerformanceMonitor {
    pub fn new(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        environment: Arc<dyn Environment>,
    ) -> Self {
        Self {
            transport,
            clock,
            environment,
        }
    }

    fn payload(&self, metric: &str, value: f64) -> MetricPayload {
        let page = self.environment.page();
        let device = self.environment.device();
        MetricPayload {
            metric: metric.to_string(),
            value,
            timestamp: self.clock.now_millis(),
            url: page.url,
            user_agent: device.user_agent,
        }
    }

    fn log_rating(metric: &str, value: f64) {
        match rate(metric, value) {
            Some(Rating::Poor) => warn!("Poor {}: {}", metric, value),
            Some(rating) => debug!("{}: {} ({})", metric, value, rating),
            None => debug!("{}: {}", metric, value),
        }
    }

    /// Send a measurement without waiting for it.
    ///
    /// Without an async runtime the beacon is dropped.
    pub fn report(&self, metric: &str, value: f64) {
        Self::log_rating(metric, value);
        let payload = self.payload(metric, value);

        let Ok(handle) = Handle::try_current() else {
            warn!("No async runtime available, dropping {} beacon", metric);
            return;
        };
        let transport = Arc::clone(&self.transport);
        handle.spawn(async move {
            if let Err(e) = transport.send_metric(&payload).await {
                warn!("Failed to send {} beacon: {}", payload.metric, e);
            }
        });
    }

    /// Send a measurement and wait for the result.
    pub async fn report_now(&self, metric: &str, value: f64) -> Result<(), TransportError> {
        Self::log_rating(metric, value);
        let payload = self.payload(metric, value);
        self.transport.send_metric(&payload).await
    }

    /// Report TTFB, DOMContentLoaded and LoadComplete for a page load.
    pub fn report_navigation_timing(&self, timing: &NavigationTiming) {
        for (metric, value) in timing.metrics() {
            self.report(metric, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{
        DeviceSnapshot, Event, HttpTransport, ManualClock, PageSnapshot, StaticEnvironment,
    };
    use futures::future::BoxFuture;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct BeaconRecorder {
        metrics: Mutex<Vec<MetricPayload>>,
    }

    impl Transport for BeaconRecorder {
        fn send_events<'a>(
            &'a self,
            _events: &'a [Event],
        ) -> BoxFuture<'a, Result<(), TransportError>> {
            Box::pin(async { Ok(()) })
        }

        fn send_metric<'a>(
            &'a self,
            metric: &'a MetricPayload,
        ) -> BoxFuture<'a, Result<(), TransportError>> {
            Box::pin(async move {
                self.metrics.lock().unwrap().push(metric.clone());
                Ok(())
            })
        }
    }

    fn environment() -> Arc<StaticEnvironment> {
        Arc::new(StaticEnvironment::new(
            PageSnapshot {
                url: "https://shop.example/products/trench".to_string(),
                title: "Trench".to_string(),
                referrer: String::new(),
            },
            DeviceSnapshot {
                user_agent: "test-agent".to_string(),
                ..DeviceSnapshot::default()
            },
        ))
    }

    // ==================== Rating Tests ====================

    #[test]
    fn test_rate_thresholds() {
        assert_eq!(rate("LCP", 2_500.0), Some(Rating::Good));
        assert_eq!(rate("LCP", 3_000.0), Some(Rating::NeedsImprovement));
        assert_eq!(rate("LCP", 4_001.0), Some(Rating::Poor));
        assert_eq!(rate("FID", 80.0), Some(Rating::Good));
        assert_eq!(rate("FID", 301.0), Some(Rating::Poor));
        assert_eq!(rate("CLS", 0.05), Some(Rating::Good));
        assert_eq!(rate("CLS", 0.2), Some(Rating::NeedsImprovement));
        assert_eq!(rate("FCP", 3_500.0), Some(Rating::Poor));
        assert_eq!(rate("TTFB", 900.0), Some(Rating::NeedsImprovement));
        assert_eq!(rate("LoadComplete", 9_000.0), None);
    }

    #[test]
    fn test_rating_display() {
        assert_eq!(Rating::NeedsImprovement.to_string(), "needs-improvement");
    }

    #[test]
    fn test_navigation_timing_metrics() {
        let timing = NavigationTiming {
            request_start: 20.0,
            response_start: 180.0,
            dom_content_loaded_event_start: 600.0,
            dom_content_loaded_event_end: 640.0,
            load_event_start: 1_200.0,
            load_event_end: 1_260.0,
        };
        assert_eq!(
            timing.metrics(),
            [("TTFB", 160.0), ("DOMContentLoaded", 40.0), ("LoadComplete", 60.0)]
        );
    }

    // ==================== Reporting Tests ====================

    #[tokio::test]
    async fn test_report_now_builds_payload() {
        let recorder = Arc::new(BeaconRecorder::default());
        let monitor = PerformanceMonitor::new(
            recorder.clone(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
            environment(),
        );

        monitor.report_now("LCP", 1_900.0).await.unwrap();

        let metrics = recorder.metrics.lock().unwrap();
        assert_eq!(
            metrics[0],
            MetricPayload {
                metric: "LCP".to_string(),
                value: 1_900.0,
                timestamp: 1_700_000_000_000,
                url: "https://shop.example/products/trench".to_string(),
                user_agent: "test-agent".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_report_navigation_timing_sends_three_beacons() {
        let mock_server = MockServer::start().await;

        for metric in ["TTFB", "DOMContentLoaded", "LoadComplete"] {
            Mock::given(method("POST"))
                .and(path("/api/metrics"))
                .and(body_partial_json(serde_json::json!({ "metric": metric })))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let monitor = PerformanceMonitor::new(
            Arc::new(HttpTransport::new(
                mock_server.uri(),
                "/api/analytics/events",
                "/api/metrics",
            )),
            Arc::new(ManualClock::new(0)),
            environment(),
        );
        monitor.report_navigation_timing(&NavigationTiming {
            request_start: 10.0,
            response_start: 90.0,
            dom_content_loaded_event_start: 300.0,
            dom_content_loaded_event_end: 320.0,
            load_event_start: 700.0,
            load_event_end: 710.0,
        });

        // Beacons are fire-and-forget
        tokio::time::sleep(Duration::from_millis(200)).await;
        mock_server.verify().await;
    }

    #[test]
    fn test_report_without_runtime_is_dropped() {
        let recorder = Arc::new(BeaconRecorder::default());
        let monitor = PerformanceMonitor::new(
            recorder.clone(),
            Arc::new(ManualClock::new(0)),
            environment(),
        );

        monitor.report("CLS", 0.4);
        assert!(recorder.metrics.lock().unwrap().is_empty());
    }
}
