use crate::i18n::Language;
use crate::telemetry::{clamp_sample_rate, TelemetryConfig};
use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Telemetry pipeline
    pub telemetry: TelemetryConfig,

    // Collector
    pub collector_port: u16,
    pub ingest_token: Option<String>,

    // i18n
    pub default_language: Language,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = TelemetryConfig::default();

        // Shared by the collector and the pipeline's transport
        let ingest_token = std::env::var("COLLECTOR_INGEST_TOKEN")
            .ok()
            .filter(|v| !v.is_empty());

        let telemetry = TelemetryConfig {
            enable_auto_tracking: env_flag("ANALYTICS_AUTO_TRACKING")
                .unwrap_or(defaults.enable_auto_tracking),
            enable_performance_tracking: env_flag("ANALYTICS_PERFORMANCE_TRACKING")
                .unwrap_or(defaults.enable_performance_tracking),
            enable_error_tracking: env_flag("ANALYTICS_ERROR_TRACKING")
                .unwrap_or(defaults.enable_error_tracking),
            enable_heatmaps: env_flag("ANALYTICS_HEATMAPS").unwrap_or(defaults.enable_heatmaps),

            sample_rate: std::env::var("ANALYTICS_SAMPLE_RATE")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .map(clamp_sample_rate)
                .unwrap_or(defaults.sample_rate),
            flush_interval: std::env::var("ANALYTICS_FLUSH_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.flush_interval),
            max_queue_size: std::env::var("ANALYTICS_MAX_QUEUE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_queue_size),
            max_buffered_events: std::env::var("ANALYTICS_MAX_BUFFERED_EVENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_buffered_events),

            base_url: std::env::var("ANALYTICS_BASE_URL").unwrap_or(defaults.base_url),
            ingest_token: ingest_token.clone(),
            ..TelemetryConfig::default()
        };

        let default_language = match std::env::var("DEFAULT_LANGUAGE") {
            Ok(code) => Language::from_code(code.trim())
                .context("DEFAULT_LANGUAGE is not a supported language")?,
            Err(_) => Language::canonical(),
        };

        Ok(Self {
            telemetry,

            collector_port: std::env::var("COLLECTOR_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            ingest_token,

            default_language,
        })
    }
}

/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`; anything else is unset.
fn env_flag(name: &str) -> Option<bool> {
    parse_flag(&std::env::var(name).ok()?)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
