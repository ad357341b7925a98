//! Cumulative-to-delta conversion cache
//!
//! Cumulative instruments report running totals, but storage wants per-interval
//! deltas. The converter keeps the previous snapshot of every live series in a
//! fixed-capacity LRU cache and swaps it for the new one on each observation.

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;

use crate::data::types::{CumPoint, DatapointKey};
use crate::utils::bfloat16;

struct CumValue {
    point: CumPoint,
    time: DateTime<Utc>,
}

/// Fixed-capacity cache of previous cumulative snapshots, keyed by series.
///
/// All access goes through a single mutex. Swaps are pure map operations, so
/// the critical section stays short even under concurrent batch workers.
pub struct CumToDeltaConv {
    cache: Mutex<LruCache<DatapointKey, CumValue>>,
}

impl CumToDeltaConv {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of series currently tracked
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Store `point` as the new snapshot for `key` and return the previous
    /// one. Returns `None` when the series is seen for the first time or when
    /// `time` is older than the stored snapshot (out-of-order delivery; the
    /// stored snapshot is left untouched).
    pub fn swap(
        &self,
        key: &DatapointKey,
        point: CumPoint,
        time: DateTime<Utc>,
    ) -> Option<CumPoint> {
        let mut cache = self.cache.lock();

        if let Some(value) = cache.get_mut(key) {
            if time < value.time {
                return None;
            }
            let prev = std::mem::replace(&mut value.point, point);
            value.time = time;
            return Some(prev);
        }

        cache.push(key.clone(), CumValue { point, time });
        None
    }
}

/// Subtract previous per-bucket counts from current ones, saturating at zero
/// for buckets that went backwards.
pub fn delta_counts(counts: &[u64], prev_counts: &[u64]) -> Vec<u64> {
    counts
        .iter()
        .zip(prev_counts)
        .map(|(&count, &prev)| count.saturating_sub(prev))
        .collect()
}

/// Build a compressed summary histogram from explicit bounds and per-bucket
/// delta counts.
///
/// Bucket means are approximated as the first bound for the underflow bucket,
/// midpoints for interior buckets, and the last bound for the overflow bucket.
/// Returns the histogram together with the smallest and largest populated
/// mean. A distribution whose buckets are all empty despite a nonzero count
/// collapses to a single entry at `avg`.
pub fn build_summary_histogram(
    bounds: &[f64],
    counts: &[u64],
    avg: f64,
    total_count: u64,
) -> (FxHashMap<u16, u64>, f64, f64) {
    let mut histogram = FxHashMap::default();
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    let mut add = |mean: f64, count: u64, histogram: &mut FxHashMap<u16, u64>| {
        *histogram.entry(bfloat16::from_f64(mean)).or_insert(0) += count;
        min = min.min(mean);
        max = max.max(mean);
    };

    if !bounds.is_empty() && counts.len() == bounds.len() + 1 {
        if counts[0] > 0 {
            add(bounds[0], counts[0], &mut histogram);
        }
        for i in 1..bounds.len() {
            if counts[i] > 0 {
                add((bounds[i - 1] + bounds[i]) / 2.0, counts[i], &mut histogram);
            }
        }
        if let Some(&last) = counts.last()
            && last > 0
        {
            add(bounds[bounds.len() - 1], last, &mut histogram);
        }
    }

    if histogram.is_empty() && total_count > 0 && avg.is_finite() {
        add(avg, total_count, &mut histogram);
    }

    if histogram.is_empty() {
        return (histogram, 0.0, 0.0);
    }
    (histogram, min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::NumberPoint;

    fn key(metric: &str, start: u64) -> DatapointKey {
        DatapointKey {
            project_id: 1,
            metric: metric.to_string(),
            attrs_hash: 7,
            start_time_unix_nano: start,
        }
    }

    fn int_point(n: i64) -> CumPoint {
        CumPoint::Number(NumberPoint::from_int(n))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_first_sight_returns_none() {
        let conv = CumToDeltaConv::new(10);
        assert!(conv.swap(&key("m", 0), int_point(5), at(100)).is_none());
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_swap_returns_previous_snapshot() {
        let conv = CumToDeltaConv::new(10);
        let k = key("m", 0);
        conv.swap(&k, int_point(5), at(100));

        let prev = conv.swap(&k, int_point(8), at(200));
        assert_eq!(prev, Some(int_point(5)));

        let prev = conv.swap(&k, int_point(12), at(300));
        assert_eq!(prev, Some(int_point(8)));
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_stale_timestamp_rejected_and_snapshot_kept() {
        let conv = CumToDeltaConv::new(10);
        let k = key("m", 0);
        conv.swap(&k, int_point(5), at(200));

        // late arrival must not clobber the newer snapshot
        assert!(conv.swap(&k, int_point(3), at(100)).is_none());

        let prev = conv.swap(&k, int_point(9), at(300));
        assert_eq!(prev, Some(int_point(5)));
    }

    #[test]
    fn test_equal_timestamp_is_accepted() {
        let conv = CumToDeltaConv::new(10);
        let k = key("m", 0);
        conv.swap(&k, int_point(5), at(100));
        assert_eq!(conv.swap(&k, int_point(6), at(100)), Some(int_point(5)));
    }

    #[test]
    fn test_restart_starts_a_new_series() {
        let conv = CumToDeltaConv::new(10);
        conv.swap(&key("m", 1000), int_point(50), at(100));

        // same metric, new start time: first sight again
        assert!(conv.swap(&key("m", 2000), int_point(3), at(200)).is_none());
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let conv = CumToDeltaConv::new(2);
        conv.swap(&key("a", 0), int_point(1), at(100));
        conv.swap(&key("b", 0), int_point(1), at(100));

        // touch "a" so "b" becomes the eviction candidate
        conv.swap(&key("a", 0), int_point(2), at(200));
        conv.swap(&key("c", 0), int_point(1), at(300));
        assert_eq!(conv.len(), 2);

        // "b" was evicted, so it is first-sight again
        assert!(conv.swap(&key("b", 0), int_point(5), at(400)).is_none());
        // "a" survived
        assert_eq!(
            conv.swap(&key("a", 0), int_point(3), at(400)),
            Some(int_point(2))
        );
    }

    #[test]
    fn test_delta_counts_saturate() {
        assert_eq!(delta_counts(&[5, 3, 10], &[2, 4, 10]), vec![3, 0, 0]);
    }

    #[test]
    fn test_summary_histogram_bucket_means() {
        // bounds [1, 2, 4]; buckets: <=1, (1,2], (2,4], >4
        let (hist, min, max) = build_summary_histogram(&[1.0, 2.0, 4.0], &[2, 3, 0, 1], 1.8, 6);

        assert_eq!(hist.get(&bfloat16::from_f64(1.0)).copied(), Some(2));
        assert_eq!(hist.get(&bfloat16::from_f64(1.5)).copied(), Some(3));
        assert_eq!(hist.get(&bfloat16::from_f64(4.0)).copied(), Some(1));
        assert_eq!(hist.len(), 3);
        assert_eq!(min, 1.0);
        assert_eq!(max, 4.0);
    }

    #[test]
    fn test_summary_histogram_empty_buckets_fall_back_to_avg() {
        let (hist, min, max) = build_summary_histogram(&[1.0, 2.0], &[0, 0, 0], 1.7, 4);

        assert_eq!(hist.len(), 1);
        assert_eq!(hist.get(&bfloat16::from_f64(1.7)).copied(), Some(4));
        assert_eq!(min, 1.7);
        assert_eq!(max, 1.7);
    }

    #[test]
    fn test_summary_histogram_all_empty() {
        let (hist, min, max) = build_summary_histogram(&[1.0], &[0, 0], f64::NAN, 0);
        assert!(hist.is_empty());
        assert_eq!(min, 0.0);
        assert_eq!(max, 0.0);
    }
}
