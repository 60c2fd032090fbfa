//! User-facing monitoring settings.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum separation before the companion is out of range.
pub const DEFAULT_MAX_RANGE_METERS: f64 = 50.0;

/// Default polling interval.
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: f64 = 1.0;

/// Default spread of the simulated companion position, in degrees.
pub const DEFAULT_DRIFT_MAGNITUDE: f64 = 0.0001;

/// Monitoring settings as entered by the user.
///
/// Values arrive unvalidated from the configuration surface. Call
/// [`MonitoringConfig::validate`] before handing them to the monitor loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Maximum allowed distance between the devices, in meters.
    #[serde(default = "default_max_range")]
    pub max_range_meters: f64,
    /// Minutes between samples. Fractional values are allowed.
    #[serde(default = "default_update_interval")]
    pub update_interval_minutes: f64,
    /// Map provider key. Opaque to the monitor.
    #[serde(default)]
    pub map_api_key: String,
}

fn default_max_range() -> f64 {
    DEFAULT_MAX_RANGE_METERS
}

fn default_update_interval() -> f64 {
    DEFAULT_UPDATE_INTERVAL_MINUTES
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            max_range_meters: default_max_range(),
            update_interval_minutes: default_update_interval(),
            map_api_key: String::new(),
        }
    }
}

impl MonitoringConfig {
    /// Set the maximum range.
    pub fn with_max_range(mut self, meters: f64) -> Self {
        self.max_range_meters = meters;
        self
    }

    /// Set the update interval.
    pub fn with_update_interval(mut self, minutes: f64) -> Self {
        self.update_interval_minutes = minutes;
        self
    }

    /// Reject settings the monitor loop cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRange`] if the range is not a positive
    /// finite number, and [`ConfigError::InvalidInterval`] if the interval is
    /// not positive, not finite, or too large to express as a timer period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_range_meters.is_finite() && self.max_range_meters > 0.0) {
            return Err(ConfigError::InvalidRange(self.max_range_meters));
        }
        self.update_interval().map(|_| ())
    }

    /// Polling period as a [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInterval`] for non-positive, non-finite,
    /// or overflowing values.
    pub fn update_interval(&self) -> Result<Duration, ConfigError> {
        let minutes = self.update_interval_minutes;
        if !(minutes.is_finite() && minutes > 0.0) {
            return Err(ConfigError::InvalidInterval(minutes));
        }
        let period = Duration::try_from_secs_f64(minutes * 60.0)
            .map_err(|_| ConfigError::InvalidInterval(minutes))?;
        // Sub-millisecond periods round to zero in the timer
        if period < Duration::from_millis(1) {
            return Err(ConfigError::InvalidInterval(minutes));
        }
        Ok(period)
    }
}

/// Reject drift magnitudes the simulator cannot use.
///
/// Zero is allowed: the companion then sits exactly on the primary.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDrift`] for negative or non-finite values.
pub fn validate_drift(drift: f64) -> Result<(), ConfigError> {
    if drift.is_finite() && drift >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDrift(drift))
    }
}
