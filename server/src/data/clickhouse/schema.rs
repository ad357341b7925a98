//! ClickHouse schema definitions

/// DDL for the datapoints table
///
/// Ordered by series identity then time so range scans over one series
/// stay local. Monthly partitions keep merges bounded.
const DATAPOINTS_DDL: &str = "\
CREATE TABLE IF NOT EXISTS datapoints (
    project_id      UInt32 CODEC(DoubleDelta, ZSTD(1)),
    metric          LowCardinality(String),
    instrument      LowCardinality(String),
    attrs_hash      UInt64 CODEC(ZSTD(1)),
    string_keys     Array(LowCardinality(String)),
    string_values   Array(String),
    time            DateTime64(6) CODEC(DoubleDelta, ZSTD(1)),
    sum             Float64 CODEC(Gorilla, ZSTD(1)),
    count           UInt64 CODEC(Delta, ZSTD(1)),
    gauge           Float64 CODEC(Gorilla, ZSTD(1)),
    min             Float64 CODEC(Gorilla, ZSTD(1)),
    max             Float64 CODEC(Gorilla, ZSTD(1)),
    histogram       String CODEC(ZSTD(1))
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(time)
ORDER BY (project_id, metric, attrs_hash, time)";

/// DDL for the metric catalog table
///
/// ReplacingMergeTree keeps the newest row per (project_id, name), so
/// repeated inserts from the refresh path act as upserts.
const METRICS_DDL: &str = "\
CREATE TABLE IF NOT EXISTS metrics (
    project_id      UInt32,
    name            LowCardinality(String),
    description     String,
    unit            LowCardinality(String),
    instrument      LowCardinality(String),
    attr_keys       Array(LowCardinality(String)),
    updated_at      DateTime64(6)
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY (project_id, name)";

/// All table creation statements, in application order
pub fn table_statements() -> [&'static str; 2] {
    [DATAPOINTS_DDL, METRICS_DDL]
}
