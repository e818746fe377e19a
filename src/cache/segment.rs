//! Per-bundle-partition accumulation buffer

use std::collections::HashMap;
use std::time::Duration;

use crate::rrd::{slot_index, slot_time};
use crate::types::{RoundRobinArchive, SeriesIdx, SlotIdx, Timestamp};

/// Pending values for one slot across every series of a bundle partition
pub type CrossSeriesRow = HashMap<SeriesIdx, f64>;

/// Accumulated, not yet persisted state of one bundle partition.
///
/// Values are stored vertically: one row per slot, each row holding the
/// pending value of every series that wrote to that slot.
///
/// Segments are only built and merged by [`VerticalCache::update`], which
/// checks the archive shape first. Outside the crate they are read-only:
///
/// ```compile_fail
/// use std::time::Duration;
/// use gorilla_vcache::cache::CacheSegment;
///
/// let _ = CacheSegment::new(Duration::from_secs(60), 5);
/// ```
///
/// [`VerticalCache::update`]: super::VerticalCache::update
#[derive(Debug, Clone)]
pub struct CacheSegment {
    rows: HashMap<SlotIdx, CrossSeriesRow>,
    latests: HashMap<SeriesIdx, Timestamp>,
    max_latest: Option<Timestamp>,
    latest_index: SlotIdx,
    step: Duration,
    size: i64,
}

impl CacheSegment {
    /// Create an empty segment for archives of the given shape
    pub(crate) fn new(step: Duration, size: i64) -> Self {
        Self {
            rows: HashMap::new(),
            latests: HashMap::new(),
            max_latest: None,
            latest_index: 0,
            step,
            size,
        }
    }

    /// Merge one series archive into the segment.
    ///
    /// `orig_latest` is the latest timestamp storage already holds for the
    /// series. Slots whose time, anchored at `orig_latest`, falls after the
    /// archive's own latest are skipped. The recorded latest of a series never
    /// drops below `orig_latest`, nor below what the segment already recorded.
    pub(crate) fn merge<A>(&mut self, rra: &A, orig_latest: Timestamp)
    where
        A: RoundRobinArchive + ?Sized,
    {
        let idx = rra.idx();
        let latest = rra.latest();

        for (&i, &v) in rra.data_points() {
            // Storage may be ahead of this update; its future slots stay untouched
            if slot_time(i, orig_latest, self.step, self.size) <= latest {
                self.rows.entry(i).or_default().insert(idx, v);
            }
        }

        let recorded = if latest > orig_latest {
            if self.max_latest.map_or(true, |max| max < latest) {
                self.max_latest = Some(latest);
                self.latest_index = slot_index(latest, self.step, self.size);
            }
            latest
        } else {
            orig_latest
        };

        let entry = self.latests.entry(idx).or_insert(recorded);
        if *entry < recorded {
            *entry = recorded;
        }
    }

    /// Pending rows, slot index to cross-series values
    pub fn rows(&self) -> &HashMap<SlotIdx, CrossSeriesRow> {
        &self.rows
    }

    /// Pending value for one cell
    pub fn value(&self, slot: SlotIdx, idx: SeriesIdx) -> Option<f64> {
        self.rows.get(&slot).and_then(|row| row.get(&idx)).copied()
    }

    /// Latest timestamp recorded for each series
    pub fn latests(&self) -> &HashMap<SeriesIdx, Timestamp> {
        &self.latests
    }

    /// Largest latest timestamp seen across all series
    pub fn max_latest(&self) -> Option<Timestamp> {
        self.max_latest
    }

    /// Slot index of `max_latest`
    pub fn latest_index(&self) -> SlotIdx {
        self.latest_index
    }

    /// Sample step shared by every series in the segment
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Buffer length shared by every series in the segment
    pub fn size(&self) -> i64 {
        self.size
    }

    /// Number of pending rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of pending cells across all rows
    pub fn point_count(&self) -> usize {
        self.rows.values().map(HashMap::len).sum()
    }

    /// True when nothing is waiting to be written
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
