//! CLI command implementations.

pub mod config;
pub mod devices;
pub mod distance;
pub mod monitor;
