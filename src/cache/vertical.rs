//! Vertical cache and flush orchestration
//!
//! Archive updates are merged into one [`CacheSegment`] per bundle partition.
//! A flush drains every segment: each one is removed from the cache and
//! handed to its own worker task, in waves of at most
//! `max_concurrent_flushes` tasks.
//!
//! ```text
//! update(rra) ──▶ segments[bundle:seg] ──flush──▶ worker ──▶ flush_rows  (per slot)
//!                                                        └─▶ flush_latests (once)
//! ```
//!
//! # Single writer
//!
//! `update` and `flush` take `&mut self`; the segment map is never shared
//! with another writer. A segment removed for flushing is owned by its worker
//! alone and is dropped when the worker finishes, whatever the outcome. Rows
//! a failed worker did not get to are lost until the series is updated again.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::segment::CacheSegment;
use super::stats::{FlushCounts, FlushReport, FlushStats};
use super::version::{latest_versions, points_with_versions};
use crate::config::VerticalCacheConfig;
use crate::error::{Error, Result};
use crate::rrd::span_millis;
use crate::storage::VerticalFlusher;
use crate::types::{BundleKey, RoundRobinArchive, Timestamp};

/// How a segment worker ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentOutcome {
    Empty,
    Flushed,
    Failed,
}

/// Write-back cache of pending archive points, organised by bundle partition
#[derive(Debug, Default)]
pub struct VerticalCache {
    segments: HashMap<BundleKey, CacheSegment>,
    config: VerticalCacheConfig,
}

impl VerticalCache {
    /// Create an empty cache
    pub fn new(config: VerticalCacheConfig) -> Self {
        Self {
            segments: HashMap::new(),
            config,
        }
    }

    /// Merge the state of one series archive into its segment.
    ///
    /// `orig_latest` is the latest timestamp storage is known to hold for the
    /// series. The segment is created on the first update for its bundle
    /// partition and takes its step and size from it; later updates must
    /// agree or [`Error::SegmentMismatch`] is returned and nothing changes.
    pub fn update<A>(&mut self, rra: &A, orig_latest: Timestamp) -> Result<()>
    where
        A: RoundRobinArchive + ?Sized,
    {
        let key = rra.bundle_key();
        let (step, size) = (rra.step(), rra.size());

        if size <= 0 {
            return Err(Error::InvalidArchive {
                key,
                reason: format!("size {} is not positive", size),
            });
        }
        if step.as_millis() == 0 {
            return Err(Error::InvalidArchive {
                key,
                reason: format!("step {:?} is shorter than a millisecond", step),
            });
        }
        if span_millis(step, size).is_none() {
            return Err(Error::InvalidArchive {
                key,
                reason: format!("step {:?} times size {} overflows the timestamp range", step, size),
            });
        }

        let segment = self
            .segments
            .entry(key)
            .or_insert_with(|| CacheSegment::new(step, size));

        if segment.step() != step || segment.size() != size {
            return Err(Error::SegmentMismatch {
                key,
                expected_step: segment.step(),
                expected_size: segment.size(),
                step,
                size,
            });
        }

        segment.merge(rra, orig_latest);
        Ok(())
    }

    /// Persist and drop every segment.
    ///
    /// Never fails: a segment whose worker hits a persistence error is logged,
    /// counted in the report and discarded. The pass's points and operations
    /// are added to `stats` before returning.
    ///
    /// If the returned future is dropped mid-pass, segments not yet dispatched
    /// stay in the cache and in-flight workers are aborted and counted as
    /// failed. Whatever the pass persisted up to then is still recorded in
    /// `stats`.
    pub async fn flush(
        &mut self,
        flusher: Arc<dyn VerticalFlusher>,
        stats: &FlushStats,
    ) -> FlushReport {
        let total = self.segments.len();
        let max_in_flight = self.config.max_concurrent_flushes.max(1);
        info!(segments = total, "Starting vertical cache flush");

        let mut pass = FlushPass::new(stats);

        let keys: Vec<BundleKey> = self.segments.keys().copied().collect();
        for key in keys {
            let Some(segment) = self.segments.remove(&key) else {
                continue;
            };

            let flusher = Arc::clone(&flusher);
            let counts = Arc::clone(&pass.counts);
            pass.wave
                .spawn(async move { flush_segment(flusher.as_ref(), &counts, key, segment).await });
            pass.report.segments += 1;

            if pass.wave.len() >= max_in_flight {
                debug!(in_flight = pass.wave.len(), total, "Waiting on segment flushes");
                await_wave(&mut pass.wave, &mut pass.report).await;
            }
        }

        debug!(in_flight = pass.wave.len(), total, "Waiting on segment flushes (final)");
        await_wave(&mut pass.wave, &mut pass.report).await;

        let report = pass.finish();
        info!(
            points = report.counts.points,
            ops = report.counts.ops,
            failed = report.failed_segments,
            duration_ms = report.elapsed.as_millis(),
            "Vertical cache flush complete"
        );
        report
    }

    /// Segment for a bundle partition, if any updates are pending
    pub fn segment(&self, key: &BundleKey) -> Option<&CacheSegment> {
        self.segments.get(key)
    }

    /// Bundle partitions with a segment
    pub fn keys(&self) -> impl Iterator<Item = &BundleKey> {
        self.segments.keys()
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True when no segment exists
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Cache configuration
    pub fn config(&self) -> &VerticalCacheConfig {
        &self.config
    }
}

/// State of one flush pass; records itself into the stats when finished or
/// when the pass is cancelled
struct FlushPass<'a> {
    stats: &'a FlushStats,
    counts: Arc<Mutex<FlushCounts>>,
    report: FlushReport,
    wave: JoinSet<SegmentOutcome>,
    start: Instant,
    recorded: bool,
}

impl<'a> FlushPass<'a> {
    fn new(stats: &'a FlushStats) -> Self {
        Self {
            stats,
            counts: Arc::new(Mutex::new(FlushCounts::default())),
            report: FlushReport::default(),
            wave: JoinSet::new(),
            start: Instant::now(),
            recorded: false,
        }
    }

    fn record(&mut self) {
        self.report.counts = *self.counts.lock();
        self.report.elapsed = self.start.elapsed();
        self.stats.record_pass(&self.report);
        self.recorded = true;
    }

    fn finish(mut self) -> FlushReport {
        self.record();
        std::mem::take(&mut self.report)
    }
}

impl Drop for FlushPass<'_> {
    fn drop(&mut self) {
        if self.recorded {
            return;
        }
        // Workers still in the wave are aborted with the JoinSet
        self.report.failed_segments += self.wave.len();
        warn!(
            aborted = self.wave.len(),
            segments = self.report.segments,
            "Vertical cache flush cancelled"
        );
        self.record();
    }
}

/// Wait for every task of the current wave
async fn await_wave(wave: &mut JoinSet<SegmentOutcome>, report: &mut FlushReport) {
    while let Some(joined) = wave.join_next().await {
        match joined {
            Ok(SegmentOutcome::Flushed) => {}
            Ok(SegmentOutcome::Empty) => report.empty_segments += 1,
            Ok(SegmentOutcome::Failed) => report.failed_segments += 1,
            Err(e) => {
                error!(error = %e, "Segment flush task aborted");
                report.failed_segments += 1;
            }
        }
    }
}

/// Persist one segment: every row, then the latests
async fn flush_segment(
    flusher: &dyn VerticalFlusher,
    counts: &Mutex<FlushCounts>,
    key: BundleKey,
    segment: CacheSegment,
) -> SegmentOutcome {
    if segment.is_empty() {
        return SegmentOutcome::Empty;
    }

    let (rows, width) = (segment.row_count(), segment.latests().len());
    debug!(bundle_id = key.bundle_id, seg = key.seg, rows, width, "Flushing segment");

    let versions = latest_versions(segment.latests(), segment.step(), segment.size());

    for (&slot, row) in segment.rows() {
        let (values, vers) = points_with_versions(row, slot, &versions);
        match flusher
            .flush_rows(key.bundle_id, key.seg, slot, &values, &vers)
            .await
        {
            Ok(ops) => {
                counts.lock().add_row(row.len(), ops);
            }
            Err(e) => {
                error!(
                    bundle_id = key.bundle_id,
                    seg = key.seg,
                    slot,
                    error = %e,
                    "Error flushing segment rows"
                );
                return SegmentOutcome::Failed;
            }
        }
    }

    if segment.latests().is_empty() {
        debug!(bundle_id = key.bundle_id, seg = key.seg, "No latests to flush");
    } else {
        debug!(bundle_id = key.bundle_id, seg = key.seg, "Flushing latests");
        match flusher
            .flush_latests(key.bundle_id, key.seg, segment.latests())
            .await
        {
            Ok(ops) => {
                counts.lock().add_ops(ops);
            }
            Err(e) => {
                error!(
                    bundle_id = key.bundle_id,
                    seg = key.seg,
                    error = %e,
                    "Error flushing segment latests"
                );
                return SegmentOutcome::Failed;
            }
        }
    }

    debug!(bundle_id = key.bundle_id, seg = key.seg, rows, width, "Segment flush done");
    SegmentOutcome::Flushed
}
