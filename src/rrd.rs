//! Round-robin slot arithmetic
//!
//! Maps wall-clock time onto positions of a circular buffer of `size` slots,
//! each `step` wide, and back. A buffer spans `step * size`; slot `n` is
//! reused once per span.
//!
//! ```text
//! step = 1m, size = 5, latest = 12m  ->  head = 12 mod 5 = 2
//!
//!   slot:   0     1     2     3     4
//!   time:  10m   11m   12m    8m    9m
//!                      ^head
//! ```

use std::time::Duration;

use crate::types::{SlotIdx, Timestamp};

/// Step in whole milliseconds, clamped to `1..=i64::MAX`
#[inline]
pub fn step_millis(step: Duration) -> i64 {
    i64::try_from(step.as_millis()).unwrap_or(i64::MAX).max(1)
}

/// Length of one full pass over the buffer in milliseconds.
///
/// `None` when the step is under a millisecond, the size is not positive, or
/// the span does not fit an `i64`.
pub fn span_millis(step: Duration, size: i64) -> Option<i64> {
    let step_ms = i64::try_from(step.as_millis()).ok().filter(|&ms| ms > 0)?;
    if size <= 0 {
        return None;
    }
    step_ms.checked_mul(size)
}

/// Slot index that `ts` falls into
#[inline]
pub fn slot_index(ts: Timestamp, step: Duration, size: i64) -> SlotIdx {
    ts.div_euclid(step_millis(step)).rem_euclid(size.max(1))
}

/// Timestamp represented by slot `n` in a buffer whose head is at `latest`.
///
/// Slots up to and including the head belong to the current pass over the
/// buffer; slots after it still hold the previous pass.
pub fn slot_time(n: SlotIdx, latest: Timestamp, step: Duration, size: i64) -> Timestamp {
    let step_ms = step_millis(step);
    let head = slot_index(latest, step, size);
    if n <= head {
        latest - (head - n) * step_ms
    } else {
        latest - (head - n + size) * step_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;

    fn step() -> Duration {
        Duration::from_secs(60)
    }

    #[test]
    fn test_slot_index() {
        assert_eq!(slot_index(12 * MINUTE, step(), 5), 2);
        assert_eq!(slot_index(10 * MINUTE, step(), 5), 0);
        assert_eq!(slot_index(14 * MINUTE + 59_999, step(), 5), 4);
        assert_eq!(slot_index(0, step(), 5), 0);
    }

    #[test]
    fn test_slot_index_negative_time() {
        // One minute before the epoch is the last slot of the previous span
        assert_eq!(slot_index(-MINUTE, step(), 5), 4);
    }

    #[test]
    fn test_slot_time_wraps_behind_head() {
        let latest = 12 * MINUTE;
        assert_eq!(slot_time(2, latest, step(), 5), 12 * MINUTE);
        assert_eq!(slot_time(1, latest, step(), 5), 11 * MINUTE);
        assert_eq!(slot_time(0, latest, step(), 5), 10 * MINUTE);
        assert_eq!(slot_time(4, latest, step(), 5), 9 * MINUTE);
        assert_eq!(slot_time(3, latest, step(), 5), 8 * MINUTE);
    }

    #[test]
    fn test_slot_time_never_after_anchor() {
        let latest = 37 * MINUTE + 1234;
        for n in 0..7 {
            let t = slot_time(n, latest, step(), 7);
            assert!(t <= latest);
            assert!(t > latest - 7 * MINUTE);
            assert_eq!(slot_index(t, step(), 7), n);
        }
    }

    #[test]
    fn test_sub_millisecond_step_is_clamped() {
        assert_eq!(step_millis(Duration::from_micros(10)), 1);
        assert_eq!(slot_index(7, Duration::from_micros(10), 5), 2);
    }

    #[test]
    fn test_huge_step_saturates() {
        assert_eq!(step_millis(Duration::MAX), i64::MAX);
        assert_eq!(slot_index(12 * MINUTE, Duration::MAX, 5), 0);
    }

    #[test]
    fn test_span_millis() {
        assert_eq!(span_millis(step(), 5), Some(5 * MINUTE));
        assert_eq!(span_millis(step(), 0), None);
        assert_eq!(span_millis(Duration::from_micros(999), 5), None);
        assert_eq!(span_millis(Duration::MAX, 1), None);
        // Fits on its own, overflows once multiplied by the size
        let wide = Duration::from_millis(i64::MAX as u64 / 2 + 1);
        assert_eq!(span_millis(wide, 1), Some(i64::MAX / 2 + 1));
        assert_eq!(span_millis(wide, 2), None);
    }
}
