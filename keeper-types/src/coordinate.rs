//! Geographic position readings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position reading in decimal degrees.
///
/// Plain value type: two readings with equal fields are the same position.
/// No range validation is performed on latitude or longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters, if the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters, if the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl Coordinate {
    /// Create a coordinate with no altitude or accuracy.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
        }
    }

    /// Set the altitude.
    pub const fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Set the accuracy radius.
    pub const fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)?;
        if let Some(alt) = self.altitude {
            write!(f, " alt={:.1}m", alt)?;
        }
        if let Some(acc) = self.accuracy {
            write!(f, " ±{:.0}m", acc)?;
        }
        Ok(())
    }
}
