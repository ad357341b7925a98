//! Shared utilities

pub mod bfloat16;
pub mod retry;
pub mod time;
