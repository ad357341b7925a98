use super::datapoint::Instrument;

/// Metric catalog entry, upserted so the metric browser stays in sync
/// with what is actually being ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub project_id: u32,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub instrument: Instrument,
    pub attr_keys: Vec<String>,
}

/// Key for the catalog refresh cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricKey {
    pub project_id: u32,
    pub metric: String,
}
