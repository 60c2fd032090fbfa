//! Location abstraction for Tracker Keeper.
//!
//! This module provides a pluggable layer over the platform location
//! capability (a phone's GPS, a location daemon, a mock for testing).
//!
//! # Design
//!
//! A provider answers a single question, "where is the primary device
//! now?", and reports failures with [`LocationError`]. Timeouts, caching
//! and the fallback coordinate are handled one level up by
//! [`PositionSource`](crate::PositionSource), so providers stay simple.
//!
//! # Example
//!
//! ```ignore
//! let provider = MockLocation::fixed(Coordinate::new(40.7128, -74.0060));
//! let reading = provider.locate(&PositionOptions::default()).await?;
//! ```

mod command;
mod mock;

pub use command::{CommandLocation, DEFAULT_LOCATION_COMMAND};
pub use mock::MockLocation;

use std::time::Duration;

use async_trait::async_trait;
use keeper_types::Coordinate;
use thiserror::Error;

/// Location errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// No location capability on this system.
    #[error("location capability not supported")]
    Unsupported,

    /// The user or OS refused access to location.
    #[error("location permission denied")]
    PermissionDenied,

    /// The capability exists but could not produce a fix.
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),

    /// No reading within the allowed wait.
    #[error("location request timed out")]
    Timeout,

    /// Anything else that went wrong inside the provider.
    #[error("internal location error: {0}")]
    Internal(String),
}

/// Options for a location request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Prefer a precise fix (GPS) over a fast one (network).
    pub high_accuracy: bool,
    /// Longest wait for a reading.
    pub timeout: Duration,
    /// Oldest cached reading that is still acceptable.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(15),
            maximum_age: Duration::from_secs(10),
        }
    }
}

/// Platform location capability.
///
/// Implementations handle the underlying mechanism
/// (location command, fixed position, mock, etc).
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Read the current position of the primary device.
    async fn locate(&self, options: &PositionOptions) -> Result<Coordinate, LocationError>;
}

#[async_trait]
impl<T: LocationProvider + ?Sized> LocationProvider for Box<T> {
    async fn locate(&self, options: &PositionOptions) -> Result<Coordinate, LocationError> {
        (**self).locate(options).await
    }
}

#[async_trait]
impl<T: LocationProvider + ?Sized> LocationProvider for std::sync::Arc<T> {
    async fn locate(&self, options: &PositionOptions) -> Result<Coordinate, LocationError> {
        (**self).locate(options).await
    }
}

/// Provider that always reports the same coordinate.
///
/// Useful on machines with no location hardware, or for demos pinned to a
/// known spot.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    coordinate: Coordinate,
}

impl FixedLocation {
    /// Create a provider pinned to `coordinate`.
    pub fn new(coordinate: Coordinate) -> Self {
        Self { coordinate }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn locate(&self, _options: &PositionOptions) -> Result<Coordinate, LocationError> {
        Ok(self.coordinate)
    }
}
