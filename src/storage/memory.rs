//! In-memory vertical storage
//!
//! Keeps one row per (bundle partition, slot) exactly like a vertical table
//! would, and enforces cell versioning. Each batch counts as one operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::VerticalFlusher;
use crate::cache::VERSION_MODULUS;
use crate::error::StorageError;
use crate::types::{BundleKey, SeriesIdx, SlotIdx, Timestamp};

/// A persisted cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredCell {
    /// Stored value
    pub value: f64,
    /// Version the value was written with
    pub version: i32,
}

/// True if version `a` is strictly newer than `b`.
///
/// Versions wrap at [`VERSION_MODULUS`], so the comparison takes the shorter
/// way around the circle: `a` is newer when it lies less than half the
/// modulus ahead of `b`.
pub fn is_newer_version(a: i32, b: i32) -> bool {
    let ahead = (a as i64 - b as i64).rem_euclid(VERSION_MODULUS);
    ahead != 0 && ahead <= VERSION_MODULUS / 2
}

/// Vertical storage held in process memory
#[derive(Debug, Default)]
pub struct MemoryFlusher {
    rows: RwLock<HashMap<(BundleKey, SlotIdx), HashMap<SeriesIdx, StoredCell>>>,
    latests: RwLock<HashMap<BundleKey, HashMap<SeriesIdx, Timestamp>>>,
    ops: AtomicU64,
    rejected: AtomicU64,
}

impl MemoryFlusher {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored cell for a series in a slot
    pub fn cell(&self, key: BundleKey, slot: SlotIdx, idx: SeriesIdx) -> Option<StoredCell> {
        self.rows
            .read()
            .get(&(key, slot))
            .and_then(|row| row.get(&idx))
            .copied()
    }

    /// Stored value for a series in a slot
    pub fn value(&self, key: BundleKey, slot: SlotIdx, idx: SeriesIdx) -> Option<f64> {
        self.cell(key, slot, idx).map(|c| c.value)
    }

    /// Stored version for a series in a slot
    pub fn version(&self, key: BundleKey, slot: SlotIdx, idx: SeriesIdx) -> Option<i32> {
        self.cell(key, slot, idx).map(|c| c.version)
    }

    /// Stored latest timestamp for a series
    pub fn latest(&self, key: BundleKey, idx: SeriesIdx) -> Option<Timestamp> {
        self.latests
            .read()
            .get(&key)
            .and_then(|l| l.get(&idx))
            .copied()
    }

    /// Number of (bundle partition, slot) rows that exist
    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    /// Batches applied so far
    pub fn ops(&self) -> u64 {
        self.ops.load(Ordering::Relaxed)
    }

    /// Cell writes refused because storage already held a newer version
    pub fn rejected_writes(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl VerticalFlusher for MemoryFlusher {
    async fn flush_rows(
        &self,
        bundle_id: i64,
        seg: i64,
        slot: SlotIdx,
        values: &HashMap<SeriesIdx, f64>,
        versions: &HashMap<SeriesIdx, i32>,
    ) -> Result<usize, StorageError> {
        if values.len() != versions.len() || values.keys().any(|k| !versions.contains_key(k)) {
            return Err(StorageError::InvalidBatch(format!(
                "row {}:{}:{} has {} values but {} versions",
                bundle_id,
                seg,
                slot,
                values.len(),
                versions.len()
            )));
        }

        let key = BundleKey::new(bundle_id, seg);
        let mut rejected = 0u64;
        {
            let mut rows = self.rows.write();
            let row = rows.entry((key, slot)).or_default();
            for (&idx, &value) in values {
                let version = versions[&idx];
                match row.get(&idx) {
                    Some(stored) if is_newer_version(stored.version, version) => rejected += 1,
                    _ => {
                        row.insert(idx, StoredCell { value, version });
                    }
                }
            }
        }

        if rejected > 0 {
            tracing::debug!(
                bundle_id,
                seg,
                slot,
                rejected,
                "Stale cell writes rejected"
            );
            self.rejected.fetch_add(rejected, Ordering::Relaxed);
        }
        self.ops.fetch_add(1, Ordering::Relaxed);
        Ok(1)
    }

    async fn flush_latests(
        &self,
        bundle_id: i64,
        seg: i64,
        latests: &HashMap<SeriesIdx, Timestamp>,
    ) -> Result<usize, StorageError> {
        let mut stored = self.latests.write();
        let bundle = stored.entry(BundleKey::new(bundle_id, seg)).or_default();
        for (&idx, &latest) in latests {
            let entry = bundle.entry(idx).or_insert(latest);
            if *entry < latest {
                *entry = latest;
            }
        }
        self.ops.fetch_add(1, Ordering::Relaxed);
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(cells: &[(SeriesIdx, f64, i32)]) -> (HashMap<SeriesIdx, f64>, HashMap<SeriesIdx, i32>) {
        let values = cells.iter().map(|&(i, v, _)| (i, v)).collect();
        let versions = cells.iter().map(|&(i, _, ver)| (i, ver)).collect();
        (values, versions)
    }

    #[test]
    fn test_version_ordering_wraps() {
        assert!(is_newer_version(3, 2));
        assert!(!is_newer_version(2, 3));
        assert!(!is_newer_version(5, 5));
        assert!(is_newer_version(0, 32766));
        // -1 is the previous epoch of 0, i.e. 32766
        assert!(is_newer_version(0, -1));
        assert!(!is_newer_version(-1, 0));
        assert!(!is_newer_version(-1, 32766));
    }

    #[tokio::test]
    async fn test_rows_apply_and_count_ops() {
        let storage = MemoryFlusher::new();
        let (values, versions) = batch(&[(0, 1.5, 2), (1, 2.5, 1)]);

        let ops = storage.flush_rows(7, 0, 4, &values, &versions).await.unwrap();
        assert_eq!(ops, 1);

        let key = BundleKey::new(7, 0);
        assert_eq!(storage.value(key, 4, 0), Some(1.5));
        assert_eq!(storage.version(key, 4, 1), Some(1));
        assert_eq!(storage.row_count(), 1);
        assert_eq!(storage.ops(), 1);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let storage = MemoryFlusher::new();
        let key = BundleKey::new(1, 0);

        let (values, versions) = batch(&[(0, 20.0, 3)]);
        storage.flush_rows(1, 0, 2, &values, &versions).await.unwrap();

        // Older epoch for the same physical slot
        let (values, versions) = batch(&[(0, 10.0, 2)]);
        storage.flush_rows(1, 0, 2, &values, &versions).await.unwrap();
        assert_eq!(storage.value(key, 2, 0), Some(20.0));
        assert_eq!(storage.rejected_writes(), 1);

        // Same epoch rewrites the cell
        let (values, versions) = batch(&[(0, 30.0, 3)]);
        storage.flush_rows(1, 0, 2, &values, &versions).await.unwrap();
        assert_eq!(storage.value(key, 2, 0), Some(30.0));

        // Next epoch overwrites
        let (values, versions) = batch(&[(0, 40.0, 4)]);
        storage.flush_rows(1, 0, 2, &values, &versions).await.unwrap();
        assert_eq!(storage.value(key, 2, 0), Some(40.0));
        assert_eq!(storage.rejected_writes(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_batch_is_invalid() {
        let storage = MemoryFlusher::new();
        let values = HashMap::from([(0, 1.0), (1, 2.0)]);
        let versions = HashMap::from([(0, 1)]);

        let err = storage
            .flush_rows(1, 0, 0, &values, &versions)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidBatch(_)));
        assert_eq!(storage.ops(), 0);
    }

    #[tokio::test]
    async fn test_latests_never_regress() {
        let storage = MemoryFlusher::new();
        let key = BundleKey::new(1, 0);

        storage
            .flush_latests(1, 0, &HashMap::from([(0, 5_000), (1, 7_000)]))
            .await
            .unwrap();
        storage
            .flush_latests(1, 0, &HashMap::from([(0, 4_000), (1, 8_000)]))
            .await
            .unwrap();

        assert_eq!(storage.latest(key, 0), Some(5_000));
        assert_eq!(storage.latest(key, 1), Some(8_000));
        assert_eq!(storage.ops(), 2);
    }
}
