//! Flush statistics
//!
//! [`FlushStats`] is the cumulative sink a caller owns and passes into every
//! flush; [`FlushReport`] describes a single pass.

use std::time::Duration;

use parking_lot::Mutex;

/// Point and operation counts contributed by flush workers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushCounts {
    /// Cells written
    pub points: u64,
    /// Underlying write operations reported by the backend
    pub ops: u64,
}

impl FlushCounts {
    /// Account for one row batch
    pub fn add_row(&mut self, points: usize, ops: usize) {
        self.points += points as u64;
        self.ops += ops as u64;
    }

    /// Account for one latests batch
    pub fn add_ops(&mut self, ops: usize) {
        self.ops += ops as u64;
    }
}

/// Cumulative totals across every flush pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushTotals {
    /// Cells written
    pub points: u64,
    /// Underlying write operations
    pub ops: u64,
    /// Completed flush passes
    pub passes: u64,
    /// Segments handed to workers
    pub segments: u64,
    /// Segments whose worker gave up part way
    pub failed_segments: u64,
}

/// Outcome of one flush pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// Segments removed from the cache and handed to workers
    pub segments: usize,
    /// Segments that had nothing to write
    pub empty_segments: usize,
    /// Segments whose worker hit a persistence error (or panicked)
    pub failed_segments: usize,
    /// Points and operations persisted during the pass
    pub counts: FlushCounts,
    /// Wall time of the pass
    pub elapsed: Duration,
}

/// Running totals shared by the caller and every flush pass.
///
/// All updates go through one lock, held only for the increment.
#[derive(Debug, Default)]
pub struct FlushStats {
    totals: Mutex<FlushTotals>,
}

impl FlushStats {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a completed pass into the totals
    pub fn record_pass(&self, report: &FlushReport) {
        let mut totals = self.totals.lock();
        totals.points += report.counts.points;
        totals.ops += report.counts.ops;
        totals.passes += 1;
        totals.segments += report.segments as u64;
        totals.failed_segments += report.failed_segments as u64;
    }

    /// Copy of the current totals
    pub fn snapshot(&self) -> FlushTotals {
        *self.totals.lock()
    }

    /// Total points persisted
    pub fn points(&self) -> u64 {
        self.totals.lock().points
    }

    /// Total write operations
    pub fn ops(&self) -> u64 {
        self.totals.lock().ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let mut counts = FlushCounts::default();
        counts.add_row(3, 1);
        counts.add_row(2, 1);
        counts.add_ops(1);
        assert_eq!(counts, FlushCounts { points: 5, ops: 3 });
    }

    #[test]
    fn test_record_pass() {
        let stats = FlushStats::new();
        let report = FlushReport {
            segments: 4,
            empty_segments: 1,
            failed_segments: 1,
            counts: FlushCounts { points: 10, ops: 4 },
            elapsed: Duration::from_millis(3),
        };
        stats.record_pass(&report);
        stats.record_pass(&report);

        let totals = stats.snapshot();
        assert_eq!(totals.points, 20);
        assert_eq!(totals.ops, 8);
        assert_eq!(totals.passes, 2);
        assert_eq!(totals.segments, 8);
        assert_eq!(totals.failed_segments, 2);
        assert_eq!(stats.points(), 20);
        assert_eq!(stats.ops(), 8);
    }
}
