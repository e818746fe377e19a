//! Vertical write-back cache
//!
//! Accumulates pending round-robin archive points in memory and flushes them
//! to storage in vertical batches: one batch per circular-buffer slot,
//! carrying every series' value for that slot.
//!
//! - **Segment**: pending rows and latests of one bundle partition (`segment.rs`)
//! - **Vertical cache**: segments keyed by bundle partition, plus the flush
//!   orchestrator (`vertical.rs`)
//! - **Versions**: wrap-around epochs stamped on every flushed cell (`version.rs`)
//! - **Stats**: cumulative flush totals and per-pass reports (`stats.rs`)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          VerticalCache                           │
//! │   ┌────────────┐   ┌────────────┐   ┌────────────┐               │
//! │   │ segment 1:0│   │ segment 1:1│   │ segment 7:0│   ...         │
//! │   │ slot → row │   │ slot → row │   │ slot → row │               │
//! │   └─────┬──────┘   └─────┬──────┘   └─────┬──────┘               │
//! └─────────┼────────────────┼────────────────┼──────────────────────┘
//!           ▼                ▼                ▼
//!      worker task      worker task      worker task   (≤ max_concurrent_flushes)
//!           └───────────┬────┴────────────────┘
//!                       ▼
//!               VerticalFlusher (rows + versions, then latests)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gorilla_vcache::cache::{FlushStats, VerticalCache};
//! use gorilla_vcache::storage::MemoryFlusher;
//!
//! let mut cache = VerticalCache::default();
//! cache.update(&archive, persisted_latest)?;
//!
//! let stats = FlushStats::new();
//! let report = cache.flush(Arc::new(MemoryFlusher::new()), &stats).await;
//! println!("{} points in {} ops", report.counts.points, report.counts.ops);
//! ```

mod segment;
pub use segment::{CacheSegment, CrossSeriesRow};

mod stats;
pub use stats::{FlushCounts, FlushReport, FlushStats, FlushTotals};

mod version;
pub use version::{latest_versions, points_with_versions, SlotVersion, VERSION_MODULUS};

mod vertical;
pub use vertical::VerticalCache;
