//! Application-wide constants and defaults

use std::time::Duration;

pub const APP_NAME: &str = "Deltapoint";
pub const APP_NAME_LOWER: &str = "deltapoint";

/// Config file searched for in the working directory
pub const CONFIG_FILE_NAME: &str = "deltapoint.json";

// Environment variable names (CLI flags fall back to these via clap)
pub const ENV_LOG: &str = "DELTAPOINT_LOG";
pub const ENV_CONFIG: &str = "DELTAPOINT_CONFIG";
pub const ENV_DEBUG: &str = "DELTAPOINT_DEBUG";
pub const ENV_BATCH_SIZE: &str = "DELTAPOINT_METRICS_BATCH_SIZE";
pub const ENV_BUFFER_SIZE: &str = "DELTAPOINT_METRICS_BUFFER_SIZE";
pub const ENV_CUM_TO_DELTA_SIZE: &str = "DELTAPOINT_METRICS_CUM_TO_DELTA_SIZE";
pub const ENV_CLICKHOUSE_URL: &str = "DELTAPOINT_CLICKHOUSE_URL";

// Batching defaults. Batch and cache sizes scale with the number of cores,
// see `scale_with_cpu` in the config module.
pub const DEFAULT_BATCH_SIZE_PER_CPU: usize = 1000;
pub const MAX_BATCH_SIZE: usize = 32_000;
pub const DEFAULT_CUM_TO_DELTA_PER_CPU: usize = 10_000;
pub const MAX_CUM_TO_DELTA_SIZE: usize = 500_000;

/// Idle flush interval for partial batches
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Minimum time between catalog upserts for the same (project, metric)
pub const METRIC_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Storage bucket resolution for Prometheus-compatible projects
pub const PROM_BUCKET_SECS: i64 = 15;
/// Storage bucket resolution for everything else
pub const DEFAULT_BUCKET_SECS: i64 = 60;

/// How long shutdown waits for in-flight batches before giving up
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Interval for the periodic pipeline stats log line
pub const STATS_LOG_INTERVAL: Duration = Duration::from_secs(30);

// ClickHouse defaults
pub const CLICKHOUSE_DEFAULT_DATABASE: &str = "deltapoint";
pub const CLICKHOUSE_DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DATAPOINTS_TABLE: &str = "datapoints";
pub const METRICS_TABLE: &str = "metrics";
