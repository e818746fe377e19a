//! Wrap-around aware cell versions
//!
//! Every time a series' circular buffer completes a full pass, its epoch
//! advances by one. A pending value is stamped with the epoch of the pass
//! it belongs to, so storage can reject a write that is older than the value
//! already sitting in the physical slot.

use std::collections::HashMap;
use std::time::Duration;

use crate::rrd::{slot_index, step_millis};
use crate::types::{SeriesIdx, SlotIdx, Timestamp};

/// Epochs roll over after this many passes (fits a signed 16-bit column)
pub const VERSION_MODULUS: i64 = 32767;

/// Head position and epoch of one series, derived from its latest timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotVersion {
    /// Slot index of the latest timestamp
    pub head: SlotIdx,
    /// Epoch of the pass the head belongs to
    pub epoch: i32,
}

impl SlotVersion {
    /// Derive head and epoch for a series whose latest timestamp is `latest`
    pub fn from_latest(latest: Timestamp, step: Duration, size: i64) -> Self {
        let span_ms = step_millis(step).saturating_mul(size.max(1));
        Self {
            head: slot_index(latest, step, size),
            epoch: latest.div_euclid(span_ms).rem_euclid(VERSION_MODULUS) as i32,
        }
    }

    /// Version to stamp on a value written to slot `i`.
    ///
    /// Slots after the head have not been reached by the current pass yet and
    /// still hold the previous epoch.
    #[inline]
    pub fn version(&self, i: SlotIdx) -> i32 {
        if i > self.head {
            self.epoch - 1
        } else {
            self.epoch
        }
    }
}

/// Head/epoch descriptors for every series in a segment
pub fn latest_versions(
    latests: &HashMap<SeriesIdx, Timestamp>,
    step: Duration,
    size: i64,
) -> HashMap<SeriesIdx, SlotVersion> {
    latests
        .iter()
        .map(|(&idx, &latest)| (idx, SlotVersion::from_latest(latest, step, size)))
        .collect()
}

/// Split one cross-series row into parallel value and version maps.
///
/// A series without a descriptor has no known head; its values are stamped
/// with version 0.
pub fn points_with_versions(
    row: &HashMap<SeriesIdx, f64>,
    i: SlotIdx,
    versions: &HashMap<SeriesIdx, SlotVersion>,
) -> (HashMap<SeriesIdx, f64>, HashMap<SeriesIdx, i32>) {
    let mut dps = HashMap::with_capacity(row.len());
    let mut vers = HashMap::with_capacity(row.len());
    for (&idx, &value) in row {
        dps.insert(idx, value);
        vers.insert(idx, versions.get(&idx).map_or(0, |v| v.version(i)));
    }
    (dps, vers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;

    fn step() -> Duration {
        Duration::from_secs(60)
    }

    #[test]
    fn test_head_and_epoch() {
        let v = SlotVersion::from_latest(12 * MINUTE, step(), 5);
        assert_eq!(v.head, 2);
        assert_eq!(v.epoch, 2);
    }

    #[test]
    fn test_versions_around_head() {
        let v = SlotVersion::from_latest(12 * MINUTE, step(), 5);
        assert_eq!(v.version(4), 1);
        assert_eq!(v.version(3), 1);
        assert_eq!(v.version(2), 2);
        assert_eq!(v.version(1), 2);
        assert_eq!(v.version(0), 2);
    }

    #[test]
    fn test_epoch_period() {
        let span = 5 * MINUTE;
        let a = SlotVersion::from_latest(12 * MINUTE, step(), 5);
        let b = SlotVersion::from_latest(12 * MINUTE + VERSION_MODULUS * span, step(), 5);
        assert_eq!(a, b);

        let last = SlotVersion::from_latest((VERSION_MODULUS - 1) * span, step(), 5);
        assert_eq!(last.epoch, 32766);
        let wrapped = SlotVersion::from_latest(VERSION_MODULUS * span, step(), 5);
        assert_eq!(wrapped.epoch, 0);
    }

    #[test]
    fn test_first_epoch_after_head_is_negative() {
        let v = SlotVersion::from_latest(MINUTE, step(), 5);
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version(3), -1);
    }

    #[test]
    fn test_latest_versions() {
        let mut latests = HashMap::new();
        latests.insert(0, 12 * MINUTE);
        latests.insert(1, 16 * MINUTE);

        let ivers = latest_versions(&latests, step(), 5);
        assert_eq!(ivers[&0], SlotVersion { head: 2, epoch: 2 });
        assert_eq!(ivers[&1], SlotVersion { head: 1, epoch: 3 });
    }

    #[test]
    fn test_points_with_versions() {
        let mut latests = HashMap::new();
        latests.insert(0, 12 * MINUTE);
        latests.insert(1, 16 * MINUTE);
        let ivers = latest_versions(&latests, step(), 5);

        let mut row = HashMap::new();
        row.insert(0, 1.0);
        row.insert(1, 2.0);
        row.insert(9, 3.0);

        let (dps, vers) = points_with_versions(&row, 2, &ivers);
        assert_eq!(dps, row);
        assert_eq!(vers[&0], 2);
        assert_eq!(vers[&1], 2);
        assert_eq!(vers[&9], 0);
    }
}
