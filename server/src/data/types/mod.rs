//! Shared data types across the pipeline and storage backends

pub mod datapoint;
pub mod metric;
pub mod project;

pub use datapoint::{
    AttrMap, CumPoint, Datapoint, DatapointKey, ExpHistogramPoint, HistogramPoint, Instrument,
    NumberPoint,
};
pub use metric::{Metric, MetricKey};
pub use project::Project;
