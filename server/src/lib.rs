//! Deltapoint server library
//!
//! Telemetry metrics ingestion pipeline: converts cumulative instrument
//! readings into deltas and bulk-writes them to the analytics backend.

pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
