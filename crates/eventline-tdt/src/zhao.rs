//! Volume-based burst detection.
//!
//! Instead of tracking individual terms, this detector watches the overall
//! posting volume. It splits time windows of increasing length (10, 20, 30
//! and 60 seconds) into two halves; when the second half out-posts the
//! first by the configured rate, that half is flagged as a burst. The
//! approach can only say that something happened, not what.

use crate::nutrition::{MemoryNutritionStore, StoreResult};

/// Default minimum ratio between the two half-window volumes.
pub const DEFAULT_POST_RATE: f64 = 1.7;

/// The increasing window lengths, in seconds, tried in order.
const TIME_WINDOWS: [i64; 4] = [10, 20, 30, 60];

/// Detects spikes in posting volume.
///
/// The store's values are post counts per second.
#[derive(Debug, Clone, PartialEq)]
pub struct Zhao {
    post_rate: f64,
}

impl Default for Zhao {
    fn default() -> Self {
        Self {
            post_rate: DEFAULT_POST_RATE,
        }
    }
}

impl Zhao {
    /// Creates a detector with the given minimum post-rate increase.
    pub fn new(post_rate: f64) -> Self {
        Self { post_rate }
    }

    /// Looks for a burst in the windows ending at the given timestamp.
    ///
    /// Returns the `(start, end)` timestamps of the bursty half-window, or
    /// `None` when no window shows a large enough increase. The timestamp
    /// itself is exclusive.
    pub fn detect(
        &self,
        store: &MemoryNutritionStore<u64>,
        timestamp: i64,
    ) -> StoreResult<Option<(i64, i64)>> {
        for window in TIME_WINDOWS {
            let half = window / 2;
            let first_half = store.between(timestamp - window, timestamp - half)?;
            let second_half = store.between(timestamp - half, timestamp)?;

            let first: u64 = first_half.values().copied().copied().sum();
            if first == 0 {
                continue;
            }

            let second: u64 = second_half.values().copied().copied().sum();
            let ratio = second as f64 / first as f64;
            if ratio >= self.post_rate {
                let start = second_half.keys().next().copied();
                let end = second_half.keys().next_back().copied();
                if let (Some(start), Some(end)) = (start, end) {
                    return Ok(Some((start, end)));
                }
            }
        }

        Ok(None)
    }
}
