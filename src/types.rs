//! Core data types used throughout the cache

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Unix timestamp in milliseconds. `0` means "never persisted".
pub type Timestamp = i64;

/// Position of a series archive within its bundle
pub type SeriesIdx = i64;

/// Position of a slot within a circular buffer
pub type SlotIdx = i64;

/// Identifies one bundle partition: a group of series archives sharing step
/// and size that are persisted together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BundleKey {
    /// Bundle identifier
    pub bundle_id: i64,
    /// Partition (segment) number within the bundle
    pub seg: i64,
}

impl BundleKey {
    /// Create a new bundle key
    pub fn new(bundle_id: i64, seg: i64) -> Self {
        Self { bundle_id, seg }
    }
}

impl fmt::Display for BundleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bundle_id, self.seg)
    }
}

/// A view of one series archive as handed to the cache.
///
/// Implementations expose the archive's placement (bundle, partition, index),
/// its shape (step, size), the latest timestamp it claims and the full
/// contents of its circular buffer.
pub trait RoundRobinArchive {
    /// Bundle the archive belongs to
    fn bundle_id(&self) -> i64;

    /// Partition number within the bundle
    fn seg(&self) -> i64;

    /// Index of the archive within its bundle partition
    fn idx(&self) -> SeriesIdx;

    /// Sample step
    fn step(&self) -> Duration;

    /// Number of slots in the circular buffer
    fn size(&self) -> i64;

    /// Latest timestamp recorded by this update
    fn latest(&self) -> Timestamp;

    /// Circular buffer contents, slot index to value
    fn data_points(&self) -> &HashMap<SlotIdx, f64>;

    /// Bundle partition key for this archive
    fn bundle_key(&self) -> BundleKey {
        BundleKey::new(self.bundle_id(), self.seg())
    }
}

/// Owned snapshot of a series archive
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSnapshot {
    /// Bundle identifier
    pub bundle_id: i64,
    /// Partition number
    pub seg: i64,
    /// Index within the bundle partition
    pub idx: SeriesIdx,
    /// Sample step
    pub step: Duration,
    /// Number of slots
    pub size: i64,
    /// Latest timestamp (unix milliseconds)
    pub latest: Timestamp,
    /// Slot index to value
    pub dps: HashMap<SlotIdx, f64>,
}

impl ArchiveSnapshot {
    /// Create an empty snapshot for the given archive placement and shape
    pub fn new(bundle_id: i64, seg: i64, idx: SeriesIdx, step: Duration, size: i64) -> Self {
        Self {
            bundle_id,
            seg,
            idx,
            step,
            size,
            latest: 0,
            dps: HashMap::new(),
        }
    }

    /// Set the latest timestamp
    pub fn with_latest(mut self, latest: Timestamp) -> Self {
        self.latest = latest;
        self
    }

    /// Set the value held in a slot
    pub fn with_point(mut self, slot: SlotIdx, value: f64) -> Self {
        self.dps.insert(slot, value);
        self
    }

    /// Set the value held in a slot in place
    pub fn set_point(&mut self, slot: SlotIdx, value: f64) {
        self.dps.insert(slot, value);
    }
}

impl RoundRobinArchive for ArchiveSnapshot {
    fn bundle_id(&self) -> i64 {
        self.bundle_id
    }

    fn seg(&self) -> i64 {
        self.seg
    }

    fn idx(&self) -> SeriesIdx {
        self.idx
    }

    fn step(&self) -> Duration {
        self.step
    }

    fn size(&self) -> i64 {
        self.size
    }

    fn latest(&self) -> Timestamp {
        self.latest
    }

    fn data_points(&self) -> &HashMap<SlotIdx, f64> {
        &self.dps
    }
}
