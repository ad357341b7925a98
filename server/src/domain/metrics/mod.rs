//! Metrics ingestion pipeline
//!
//! Datapoints enter through `DatapointProcessor::submit`, get batched on a
//! bounded queue, and flow through fingerprinting, cumulative-to-delta
//! conversion, project resolution, and catalog refresh before landing in
//! storage as bulk inserts.

pub mod convert;
pub mod fingerprint;
pub mod processor;
pub mod stats;

pub use convert::CumToDeltaConv;
pub use fingerprint::Fingerprinter;
pub use processor::DatapointProcessor;
pub use stats::ProcessorStats;
