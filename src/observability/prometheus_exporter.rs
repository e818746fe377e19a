//! Prometheus metrics exporter for vertical flushes
//!
//! Formats cumulative flush totals in Prometheus text exposition format and
//! appends whatever is registered in the default `prometheus` registry.

use std::fmt::Write;
use std::sync::Arc;

use prometheus::{Encoder, TextEncoder};

use crate::cache::{FlushStats, FlushTotals};

/// Configuration for Prometheus exporter
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Prefix for all metric names (default: "gorilla_vcache")
    pub metric_prefix: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            metric_prefix: "gorilla_vcache".to_string(),
        }
    }
}

/// Prometheus metrics exporter
pub struct PrometheusExporter {
    config: PrometheusConfig,
    stats: Arc<FlushStats>,
}

impl PrometheusExporter {
    /// Create a new Prometheus exporter over shared flush totals
    pub fn new(config: PrometheusConfig, stats: Arc<FlushStats>) -> Self {
        Self { config, stats }
    }

    /// Export metrics in Prometheus text format.
    ///
    /// `pending_segments` is the number of segments currently waiting in the
    /// cache; the exporter has no access to the cache itself.
    pub fn export(&self, pending_segments: usize) -> String {
        let mut output = String::new();
        let totals = self.stats.snapshot();
        let prefix = &self.config.metric_prefix;

        self.export_flush_metrics(&mut output, prefix, &totals, pending_segments);

        if let Ok(global_metrics) = self.export_global_metrics() {
            output.push_str(&global_metrics);
        }

        output
    }

    fn export_flush_metrics(
        &self,
        output: &mut String,
        prefix: &str,
        totals: &FlushTotals,
        pending_segments: usize,
    ) {
        let counters: [(&str, &str, u64); 5] = [
            ("points_flushed_total", "Total points persisted by vertical flushes", totals.points),
            ("ops_total", "Total write operations reported by the backend", totals.ops),
            ("flush_passes_total", "Total completed flush passes", totals.passes),
            ("segments_flushed_total", "Total segments handed to flush workers", totals.segments),
            (
                "segment_failures_total",
                "Total segments abandoned after a persistence error",
                totals.failed_segments,
            ),
        ];

        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {}_{} {}", prefix, name, help);
            let _ = writeln!(output, "# TYPE {}_{} counter", prefix, name);
            let _ = writeln!(output, "{}_{} {}\n", prefix, name, value);
        }

        let _ = writeln!(
            output,
            "# HELP {}_pending_segments Segments waiting in the cache",
            prefix
        );
        let _ = writeln!(output, "# TYPE {}_pending_segments gauge", prefix);
        let _ = writeln!(output, "{}_pending_segments {}\n", prefix, pending_segments);
    }

    /// Export global metrics from prometheus crate registry
    fn export_global_metrics(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = vec![];

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("Failed to encode metrics: {}", e))?;

        String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
    }

    /// Export metrics as HTTP response body with correct content type
    pub fn export_http(&self, pending_segments: usize) -> (String, &'static str) {
        let body = self.export(pending_segments);
        let content_type = "text/plain; version=0.0.4; charset=utf-8";
        (body, content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FlushCounts, FlushReport};

    fn create_test_stats() -> Arc<FlushStats> {
        let stats = Arc::new(FlushStats::new());
        stats.record_pass(&FlushReport {
            segments: 3,
            failed_segments: 1,
            counts: FlushCounts { points: 120, ops: 9 },
            ..Default::default()
        });
        stats
    }

    #[test]
    fn test_prometheus_config_default() {
        let config = PrometheusConfig::default();
        assert_eq!(config.metric_prefix, "gorilla_vcache");
    }

    #[test]
    fn test_prometheus_export_values() {
        let exporter = PrometheusExporter::new(PrometheusConfig::default(), create_test_stats());
        let output = exporter.export(4);

        assert!(output.contains("gorilla_vcache_points_flushed_total 120"));
        assert!(output.contains("gorilla_vcache_ops_total 9"));
        assert!(output.contains("gorilla_vcache_flush_passes_total 1"));
        assert!(output.contains("gorilla_vcache_segments_flushed_total 3"));
        assert!(output.contains("gorilla_vcache_segment_failures_total 1"));
        assert!(output.contains("gorilla_vcache_pending_segments 4"));
        assert!(output.contains("# TYPE gorilla_vcache_ops_total counter"));
        assert!(output.contains("# TYPE gorilla_vcache_pending_segments gauge"));
    }

    #[test]
    fn test_prometheus_export_http() {
        let exporter = PrometheusExporter::new(PrometheusConfig::default(), create_test_stats());
        let (body, content_type) = exporter.export_http(0);

        assert!(!body.is_empty());
        assert!(content_type.contains("version=0.0.4"));
    }

    #[test]
    fn test_custom_metric_prefix() {
        let config = PrometheusConfig {
            metric_prefix: "custom_prefix".to_string(),
        };
        let exporter = PrometheusExporter::new(config, create_test_stats());

        let output = exporter.export(0);
        assert!(output.contains("custom_prefix_points_flushed_total 120"));
        assert!(!output.contains("gorilla_vcache_points_flushed_total"));
    }
}
