//! Domain logic

pub mod metrics;
