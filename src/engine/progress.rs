// Per-transfer progress accounting: one writer, many concurrent readers.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Sentinel for "length not reported by the source".
const TOTAL_UNKNOWN: i64 = -1;

/// Consistent view of one transfer's counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub bytes_read: u64,
    pub total_bytes: Option<u64>,
}

/// Counter pair updated by the owning transfer's I/O loop and read by any
/// number of concurrent listing requests.
///
/// Write protocol: the owning routine sets the total (when the source
/// declares one) before counting the first chunk. `add` publishes with
/// Release and `snapshot` loads the byte counter with Acquire before the
/// total, so a reader that observes counted bytes also observes the total
/// those bytes were counted under. The pair is never torn.
pub struct ProgressTracker {
    bytes_read: AtomicU64,
    total_bytes: AtomicI64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            bytes_read: AtomicU64::new(0),
            total_bytes: AtomicI64::new(TOTAL_UNKNOWN),
        }
    }

    /// Record the declared source length. The first call wins; later calls
    /// are no-ops, so re-processed headers cannot move the total.
    pub fn set_total(&self, total: u64) -> bool {
        let total = i64::try_from(total).unwrap_or(i64::MAX);
        self.total_bytes
            .compare_exchange(TOTAL_UNKNOWN, total, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    /// Add `delta` to the byte counter. Only the owning routine calls this.
    pub fn add(&self, delta: u64) {
        self.bytes_read.fetch_add(delta, Ordering::Release);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let bytes_read = self.bytes_read.load(Ordering::Acquire);
        let total = self.total_bytes.load(Ordering::Acquire);
        ProgressSnapshot {
            bytes_read,
            total_bytes: u64::try_from(total).ok(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
