//! ClickHouse row structures
//!
//! Provides batch-insert rows for the datapoints table and the metric catalog.

use clickhouse::Row;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::data::types::{Datapoint, Metric};
use crate::utils::bfloat16;
use crate::utils::time::chrono_to_time;

/// Row structure for inserting datapoints into ClickHouse
#[derive(Row, Serialize)]
pub(super) struct DatapointRow {
    project_id: u32,
    metric: String,
    instrument: String,
    attrs_hash: u64,
    string_keys: Vec<String>,
    string_values: Vec<String>,
    #[serde(with = "clickhouse::serde::time::datetime64::micros")]
    time: time::OffsetDateTime,
    sum: f64,
    count: u64,
    gauge: f64,
    min: f64,
    max: f64,
    /// Summary histogram serialized as a JSON array of [mean, count] pairs
    histogram: String,
}

impl From<&Datapoint> for DatapointRow {
    fn from(dp: &Datapoint) -> Self {
        Self {
            project_id: dp.project_id,
            metric: dp.metric.clone(),
            instrument: dp.instrument.as_str().to_string(),
            attrs_hash: dp.attrs_hash,
            string_keys: dp.string_keys.clone(),
            string_values: dp.string_values.clone(),
            time: chrono_to_time(dp.time),
            sum: dp.sum,
            count: dp.count,
            gauge: dp.gauge,
            min: dp.min,
            max: dp.max,
            histogram: histogram_to_json(&dp.histogram),
        }
    }
}

/// Row structure for upserting metric catalog entries
#[derive(Row, Serialize)]
pub(super) struct MetricRow {
    project_id: u32,
    name: String,
    description: String,
    unit: String,
    instrument: String,
    attr_keys: Vec<String>,
    #[serde(with = "clickhouse::serde::time::datetime64::micros")]
    updated_at: time::OffsetDateTime,
}

impl From<&Metric> for MetricRow {
    fn from(metric: &Metric) -> Self {
        Self {
            project_id: metric.project_id,
            name: metric.name.clone(),
            description: metric.description.clone(),
            unit: metric.unit.clone(),
            instrument: metric.instrument.as_str().to_string(),
            attr_keys: metric.attr_keys.clone(),
            updated_at: chrono_to_time(chrono::Utc::now()),
        }
    }
}

/// Serialize a summary histogram to a JSON array of [mean, count] pairs,
/// sorted by mean so identical histograms always serialize identically.
fn histogram_to_json(histogram: &FxHashMap<u16, u64>) -> String {
    if histogram.is_empty() {
        return "[]".to_string();
    }

    let mut pairs: Vec<(f64, u64)> = histogram
        .iter()
        .map(|(&mean, &count)| (bfloat16::to_f64(mean), count))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let entries: Vec<serde_json::Value> = pairs
        .into_iter()
        .map(|(mean, count)| serde_json::json!([mean, count]))
        .collect();
    serde_json::Value::Array(entries).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::Instrument;
    use chrono::Utc;

    #[test]
    fn test_datapoint_row_conversion() {
        let mut dp = Datapoint::new(1, "http.requests", Utc::now());
        dp.instrument = Instrument::Counter;
        dp.sum = 12.5;
        dp.string_keys = vec!["env".to_string()];
        dp.string_values = vec!["prod".to_string()];

        let row = DatapointRow::from(&dp);
        assert_eq!(row.project_id, 1);
        assert_eq!(row.metric, "http.requests");
        assert_eq!(row.instrument, "counter");
        assert_eq!(row.sum, 12.5);
        assert_eq!(row.histogram, "[]");
    }

    #[test]
    fn test_histogram_json_sorted_by_mean() {
        let mut histogram = FxHashMap::default();
        histogram.insert(bfloat16::from_f64(4.0), 2u64);
        histogram.insert(bfloat16::from_f64(0.5), 7u64);

        let json = histogram_to_json(&histogram);
        assert_eq!(json, "[[0.5,7],[4.0,2]]");
    }
}
