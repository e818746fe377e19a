//! Vertical write-back cache for round-robin time-series archives
//!
//! Series archives are fixed-size circular buffers. Archives that share step
//! and size are grouped into bundle partitions and persisted together. This
//! crate accumulates pending archive points per partition, one row per slot,
//! and flushes them with bounded parallelism. Each flushed cell carries a
//! wrap-around epoch so storage can refuse stale overwrites.
//!
//! # Modules
//!
//! - [`cache`]: segments, the vertical cache and the flush orchestrator
//! - [`rrd`]: slot arithmetic between timestamps and buffer positions
//! - [`storage`]: the persistence port and an in-memory backend
//! - [`config`]: TOML configuration
//! - [`observability`]: Prometheus export of flush totals

pub mod cache;
pub mod config;
pub mod error;
pub mod observability;
pub mod rrd;
pub mod storage;
pub mod types;

pub use cache::{FlushReport, FlushStats, VerticalCache};
pub use config::VerticalCacheConfig;
pub use error::{Error, Result, StorageError};
pub use storage::{MemoryFlusher, VerticalFlusher};
pub use types::{ArchiveSnapshot, BundleKey, RoundRobinArchive, SeriesIdx, SlotIdx, Timestamp};
