//! Translation lookup metrics.
//!
//! Counts how often storefront lookups resolve, miss, or hit an empty
//! translation and fall back to the key.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Global translation metrics singleton.
pub struct TranslationMetrics {
    /// Lookups that produced a translated value
    hits: AtomicUsize,

    /// Lookups whose key path did not resolve
    misses: AtomicUsize,

    /// Lookups that resolved to an empty string and rendered the key
    empty_fallbacks: AtomicUsize,
}

/// Global metrics instance (initialized lazily)
static METRICS: OnceLock<TranslationMetrics> = OnceLock::new();

impl TranslationMetrics {
    /// Get the global translation metrics instance.
    pub fn global() -> &'static TranslationMetrics {
        METRICS.get_or_init(|| TranslationMetrics {
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            empty_fallbacks: AtomicUsize::new(0),
        })
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_fallback(&self) {
        self.empty_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn empty_fallbacks(&self) -> usize {
        self.empty_fallbacks.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let hits = self.hits();
        let misses = self.misses();
        let empty_fallbacks = self.empty_fallbacks();
        let total = hits + misses + empty_fallbacks;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            hits,
            misses,
            empty_fallbacks,
            hit_rate,
        }
    }

    /// Reset all metrics to zero (useful for testing).
    #[cfg(test)]
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.empty_fallbacks.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of the lookup counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub hits: usize,
    pub misses: usize,
    pub empty_fallbacks: usize,

    /// Share of lookups that rendered a translation, as a percentage (0-100)
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_counters() {
        let metrics = TranslationMetrics::global();
        metrics.reset();

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_empty_fallback();

        assert_eq!(metrics.hits(), 2);
        assert_eq!(metrics.misses(), 1);
        assert_eq!(metrics.empty_fallbacks(), 1);
    }

    #[test]
    #[serial]
    fn test_report_empty() {
        let metrics = TranslationMetrics::global();
        metrics.reset();

        let report = metrics.report();
        assert_eq!(report.hits, 0);
        assert_eq!(report.hit_rate, 0.0);
    }

    #[test]
    #[serial]
    fn test_report_hit_rate() {
        let metrics = TranslationMetrics::global();
        metrics.reset();

        // 3 hits, 1 miss = 75%
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        assert_eq!(metrics.report().hit_rate, 75.0);
    }

    #[test]
    fn test_global_returns_same_instance() {
        assert!(std::ptr::eq(
            TranslationMetrics::global(),
            TranslationMetrics::global()
        ));
    }

    #[test]
    fn test_report_serializes() {
        let report = MetricsReport {
            hits: 1,
            misses: 0,
            empty_fallbacks: 0,
            hit_rate: 100.0,
        };
        let json = serde_json::to_value(&report).expect("Should serialize");
        assert_eq!(json["hit_rate"], 100.0);
    }
}
