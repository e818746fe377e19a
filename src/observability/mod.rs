//! Observability for the flush engine
//!
//! Flush progress is reported through `tracing` events; cumulative totals
//! held in [`FlushStats`](crate::cache::FlushStats) are exposed here in
//! Prometheus text format.
//!
//! ```text
//! VerticalCache::flush ──▶ FlushStats ──▶ PrometheusExporter ──▶ /metrics
//! ```

pub mod prometheus_exporter;

pub use prometheus_exporter::{PrometheusConfig, PrometheusExporter};
