// ── Nearest-timestamp lookup ──
//
// Backs interactive scrubbing over a history series: called on every
// pointer move, so it is a binary search over the sorted slice.

use chrono::{DateTime, Utc};

use crate::model::HistorySnapshot;

pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for HistorySnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.updated_timestamp
    }
}

/// Index of the entry closest to `at` in a slice sorted ascending by
/// timestamp.
///
/// Ties go to the earlier entry, including within runs of equal
/// timestamps. Instants before the first or after the last entry clamp
/// to that end. `None` only for an empty slice.
pub fn nearest_index<T: Timestamped>(sorted: &[T], at: DateTime<Utc>) -> Option<usize> {
    let last = sorted.len().checked_sub(1)?;

    // First entry at or after `at`.
    let after = sorted.partition_point(|s| s.timestamp() < at);
    let candidate = if after == 0 {
        0
    } else if after > last {
        last
    } else {
        let before = after - 1;
        let to_before = at - sorted[before].timestamp();
        let to_after = sorted[after].timestamp() - at;
        if to_before <= to_after { before } else { after }
    };

    // Step back to the start of an equal-timestamp run.
    let ts = sorted[candidate].timestamp();
    Some(sorted[..candidate].partition_point(|s| s.timestamp() < ts))
}

/// Entry closest to `at`. See [`nearest_index`].
pub fn nearest<T: Timestamped>(sorted: &[T], at: DateTime<Utc>) -> Option<&T> {
    nearest_index(sorted, at).and_then(|i| sorted.get(i))
}
