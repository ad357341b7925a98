//! Storage traits
//!
//! The pipeline talks to its collaborators through these traits so the
//! processor can be tested against in-memory mocks and the analytics backend
//! can be swapped without touching the pipeline.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{Datapoint, Metric, Project};

/// Bulk write sink for processed datapoints and the metric catalog
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Bulk-insert one processed batch. Called once per flush.
    async fn insert_datapoints(&self, datapoints: &[Datapoint]) -> Result<(), DataError>;

    /// Idempotent catalog upsert keyed by (project, name)
    async fn upsert_metrics(&self, metrics: &[Metric]) -> Result<(), DataError>;
}

/// Project lookup used to resolve a datapoint's tenancy
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    /// Resolve a project id; `Ok(None)` when the project is unknown
    async fn resolve_project(&self, project_id: u32) -> Result<Option<Project>, DataError>;
}
