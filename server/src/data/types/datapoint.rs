//! Datapoint model
//!
//! One `Datapoint` is a single ingested metric observation. Protocol decoders
//! (OTLP push, Prometheus remote-write, CloudWatch streams) produce these and
//! hand them to the processor via `DatapointProcessor::submit`. Cumulative
//! instruments additionally carry a `CumPoint` raw snapshot which the pipeline
//! converts to a delta before storage.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

use crate::utils::bfloat16;

pub type AttrMap = FxHashMap<String, String>;

/// Instrument kind of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Instrument {
    #[default]
    Gauge,
    /// Monotonic counter (reported cumulatively by most SDKs)
    Counter,
    /// Non-monotonic sum
    Additive,
    Histogram,
}

impl Instrument {
    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::Gauge => "gauge",
            Instrument::Counter => "counter",
            Instrument::Additive => "additive",
            Instrument::Histogram => "histogram",
        }
    }
}

/// One ingested metric observation
#[derive(Debug, Clone)]
pub struct Datapoint {
    pub project_id: u32,
    pub metric: String,
    pub description: String,
    pub unit: String,
    pub instrument: Instrument,

    pub attrs: AttrMap,
    /// 64-bit content hash of the sorted attribute set, filled in by the
    /// fingerprinter
    pub attrs_hash: u64,
    pub string_keys: Vec<String>,
    pub string_values: Vec<String>,

    pub time: DateTime<Utc>,
    /// Start of the cumulative series in unix nanoseconds; part of the
    /// series identity (a process restart starts a new series)
    pub start_time_unix_nano: u64,

    pub sum: f64,
    pub count: u64,
    pub gauge: f64,
    pub min: f64,
    pub max: f64,
    /// Compressed summary histogram: bfloat16-encoded bucket mean -> count.
    /// Empty when the point carries no distribution.
    pub histogram: FxHashMap<u16, u64>,

    /// Raw cumulative snapshot; `None` means the point already carries a delta
    pub cum_point: Option<CumPoint>,
}

impl Datapoint {
    pub fn new(project_id: u32, metric: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            project_id,
            metric: metric.into(),
            description: String::new(),
            unit: String::new(),
            instrument: Instrument::default(),
            attrs: AttrMap::default(),
            attrs_hash: 0,
            string_keys: Vec::new(),
            string_values: Vec::new(),
            time,
            start_time_unix_nano: 0,
            sum: 0.0,
            count: 0,
            gauge: 0.0,
            min: 0.0,
            max: 0.0,
            histogram: FxHashMap::default(),
            cum_point: None,
        }
    }

    /// Identity of the cumulative series this point belongs to
    pub fn series_key(&self) -> DatapointKey {
        DatapointKey {
            project_id: self.project_id,
            metric: self.metric.clone(),
            attrs_hash: self.attrs_hash,
            start_time_unix_nano: self.start_time_unix_nano,
        }
    }
}

/// Cache key uniquely identifying one cumulative series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatapointKey {
    pub project_id: u32,
    pub metric: String,
    pub attrs_hash: u64,
    pub start_time_unix_nano: u64,
}

/// Raw cumulative snapshot, one of three mutually exclusive shapes
#[derive(Debug, Clone, PartialEq)]
pub enum CumPoint {
    Number(NumberPoint),
    Histogram(HistogramPoint),
    ExpHistogram(ExpHistogramPoint),
}

/// Cumulative total of a counter or additive instrument. Decoders fill in
/// whichever representation the wire carried and leave the other at zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NumberPoint {
    pub int: i64,
    pub double: f64,
}

impl NumberPoint {
    pub fn from_int(n: i64) -> Self {
        Self { int: n, double: 0.0 }
    }

    pub fn from_double(n: f64) -> Self {
        Self { int: 0, double: n }
    }
}

/// Cumulative fixed-boundary histogram snapshot
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistogramPoint {
    pub sum: f64,
    pub count: u64,
    pub bounds: Vec<f64>,
    /// Per-bucket cumulative counts; always `bounds.len() + 1` entries
    pub bucket_counts: Vec<u64>,
}

/// Cumulative base-2 exponential histogram snapshot, flattened into a sparse
/// bucket-mean -> count map at decode time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpHistogramPoint {
    pub sum: f64,
    pub count: u64,
    pub histogram: FxHashMap<u16, u64>,
}

impl ExpHistogramPoint {
    /// Flatten an OTLP exponential histogram data point into the sparse
    /// mean map. `scale` selects the bucket base `2^(2^-scale)`; positive and
    /// negative buckets are dense arrays starting at their offsets.
    #[allow(clippy::too_many_arguments)]
    pub fn from_buckets(
        sum: f64,
        count: u64,
        scale: i32,
        zero_count: u64,
        positive_offset: i32,
        positive_counts: &[u64],
        negative_offset: i32,
        negative_counts: &[u64],
    ) -> Self {
        let base = 2f64.powf(2f64.powi(-scale));
        let mut histogram = FxHashMap::default();

        if zero_count > 0 {
            *histogram.entry(bfloat16::from_f64(0.0)).or_insert(0) += zero_count;
        }
        populate_bucket_means(&mut histogram, base, positive_offset, positive_counts, 1.0);
        populate_bucket_means(&mut histogram, base, negative_offset, negative_counts, -1.0);

        Self {
            sum,
            count,
            histogram,
        }
    }
}

fn populate_bucket_means(
    histogram: &mut FxHashMap<u16, u64>,
    base: f64,
    offset: i32,
    counts: &[u64],
    sign: f64,
) {
    let mut lower = base.powi(offset);
    for (i, &count) in counts.iter().enumerate() {
        let upper = base.powi(offset + i as i32 + 1);
        if count > 0 {
            let mean = (lower + upper) / 2.0;
            *histogram.entry(bfloat16::from_f64(sign * mean)).or_insert(0) += count;
        }
        lower = upper;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_key_includes_start_time() {
        let mut dp = Datapoint::new(1, "http.requests", Utc::now());
        dp.attrs_hash = 42;
        dp.start_time_unix_nano = 1000;

        let a = dp.series_key();
        dp.start_time_unix_nano = 2000;
        let b = dp.series_key();

        assert_ne!(a, b);
    }

    #[test]
    fn test_exp_histogram_from_buckets() {
        // scale 0 => base 2; positive buckets at offset 0: (1,2], (2,4]
        let point = ExpHistogramPoint::from_buckets(10.0, 7, 0, 2, 0, &[3, 2], 0, &[]);

        assert_eq!(point.count, 7);
        // zero bucket + two populated positive buckets
        assert_eq!(point.histogram.len(), 3);
        assert_eq!(
            point.histogram.get(&bfloat16::from_f64(0.0)).copied(),
            Some(2)
        );
        assert_eq!(
            point.histogram.get(&bfloat16::from_f64(1.5)).copied(),
            Some(3)
        );
        assert_eq!(
            point.histogram.get(&bfloat16::from_f64(3.0)).copied(),
            Some(2)
        );
    }

    #[test]
    fn test_exp_histogram_negative_buckets_signed_means() {
        let point = ExpHistogramPoint::from_buckets(-3.0, 1, 0, 0, 0, &[], 0, &[1]);
        assert_eq!(
            point.histogram.get(&bfloat16::from_f64(-1.5)).copied(),
            Some(1)
        );
    }

    #[test]
    fn test_instrument_as_str() {
        assert_eq!(Instrument::Counter.as_str(), "counter");
        assert_eq!(Instrument::default().as_str(), "gauge");
    }
}
