//! Data storage layer
//!
//! Provides storage services for the pipeline:
//! - `clickhouse` - Analytics backend for datapoints and the metric catalog
//! - `projects` - Config-seeded project directory
//! - `types` - Shared data types
//! - `traits` - Storage traits so the pipeline stays backend-agnostic
//! - `error` - Unified error type

pub mod clickhouse;
pub mod error;
pub mod projects;
pub mod traits;
pub mod types;

pub use clickhouse::ClickhouseService;
pub use error::DataError;
pub use projects::ConfigProjectDirectory;
pub use traits::{ProjectDirectory, TelemetryStore};
pub use types::{CumPoint, Datapoint, DatapointKey, Instrument, Metric, Project};
