//! Persistence port for vertical flushes
//!
//! The cache hands each flushed row to a [`VerticalFlusher`] as one batch:
//! every series' value for a single slot of a bundle partition, together with
//! the version each value was stamped with. Latest timestamps follow in a
//! separate batch once all rows of the partition are written.
//!
//! Backends must apply the optimistic-concurrency rule: a cell write whose
//! version is older than the version already stored for that cell is not
//! applied.

mod memory;

pub use memory::{is_newer_version, MemoryFlusher, StoredCell};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{SeriesIdx, SlotIdx, Timestamp};

/// Backend that persists vertical row batches and per-series latests.
///
/// Both methods return the number of underlying write operations performed.
#[async_trait]
pub trait VerticalFlusher: Send + Sync {
    /// Write one slot's values across the listed series of a bundle partition
    async fn flush_rows(
        &self,
        bundle_id: i64,
        seg: i64,
        slot: SlotIdx,
        values: &HashMap<SeriesIdx, f64>,
        versions: &HashMap<SeriesIdx, i32>,
    ) -> Result<usize, StorageError>;

    /// Persist the latest timestamp of each listed series
    async fn flush_latests(
        &self,
        bundle_id: i64,
        seg: i64,
        latests: &HashMap<SeriesIdx, Timestamp>,
    ) -> Result<usize, StorageError>;
}
