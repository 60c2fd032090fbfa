//! Error types for Tracker Keeper settings.

use thiserror::Error;

/// Settings rejected before they reach the monitor loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Maximum range is not a positive finite number of meters.
    #[error("max range must be a positive number of meters, got {0}")]
    InvalidRange(f64),

    /// Update interval is not a positive finite number of minutes.
    #[error("update interval must be a positive number of minutes, got {0}")]
    InvalidInterval(f64),

    /// Drift magnitude is negative or not finite.
    #[error("drift magnitude must be zero or positive, got {0}")]
    InvalidDrift(f64),
}
