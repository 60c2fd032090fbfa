//! # keeper-types
//!
//! Value types for the Tracker Keeper proximity monitor.
//!
//! This crate provides the foundational types used across all Tracker Keeper crates:
//! - [`Coordinate`] - A geographic position reading
//! - [`ConnectionPhase`], [`Platform`] - Pairing lifecycle and device platform tags
//! - [`MonitoringConfig`] - User-facing monitoring settings
//! - [`ConfigError`] - Configuration validation errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod coordinate;
mod error;
mod phase;

pub use config::{
    validate_drift, MonitoringConfig, DEFAULT_DRIFT_MAGNITUDE, DEFAULT_MAX_RANGE_METERS,
    DEFAULT_UPDATE_INTERVAL_MINUTES,
};
pub use coordinate::Coordinate;
pub use error::ConfigError;
pub use phase::{ConnectionPhase, Platform};
