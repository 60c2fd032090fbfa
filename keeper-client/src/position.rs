//! Primary device positioning.
//!
//! [`PositionSource`] wraps a [`LocationProvider`] with the request policy
//! (timeout, cache age) and a no-fail contract: every failure resolves to
//! [`FALLBACK_COORDINATE`], so the monitor loop never stalls on a flaky
//! location service.

use std::sync::{Mutex, PoisonError};

use keeper_types::Coordinate;
use tokio::time::Instant;

use crate::location::{LocationError, LocationProvider, PositionOptions};

/// Coordinate reported when no real reading is available (New York City).
pub const FALLBACK_COORDINATE: Coordinate = Coordinate::new(40.7128, -74.0060)
    .with_altitude(10.0)
    .with_accuracy(100.0);

#[derive(Debug, Clone, Copy)]
struct CachedReading {
    coordinate: Coordinate,
    read_at: Instant,
}

/// Source of the primary device position.
///
/// A `PositionSource` without a provider models a platform with no location
/// capability at all.
#[derive(Debug)]
pub struct PositionSource<L> {
    provider: Option<L>,
    options: PositionOptions,
    fallback: Coordinate,
    cache: Mutex<Option<CachedReading>>,
}

impl<L: LocationProvider> PositionSource<L> {
    /// Create a source reading from `provider` with default options.
    pub fn new(provider: L) -> Self {
        Self::from_provider(Some(provider))
    }

    /// Create a source for a platform with no location capability.
    ///
    /// Every read resolves to the fallback coordinate.
    pub fn unsupported() -> Self {
        Self::from_provider(None)
    }

    fn from_provider(provider: Option<L>) -> Self {
        Self {
            provider,
            options: PositionOptions::default(),
            fallback: FALLBACK_COORDINATE,
            cache: Mutex::new(None),
        }
    }

    /// Override the request options.
    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    /// Override the fallback coordinate.
    pub fn with_fallback(mut self, fallback: Coordinate) -> Self {
        self.fallback = fallback;
        self
    }

    /// Request options in use.
    pub fn options(&self) -> &PositionOptions {
        &self.options
    }

    /// Current position of the primary device.
    ///
    /// Never fails: capability absence, permission denial, timeout and
    /// provider errors all resolve to the fallback coordinate with a warning.
    pub async fn current_position(&self) -> Coordinate {
        match self.try_current_position().await {
            Ok(coordinate) => coordinate,
            Err(e) => {
                tracing::warn!("Location unavailable ({}), using fallback coordinates", e);
                self.fallback
            }
        }
    }

    /// Current position, or the reason no real reading could be taken.
    pub async fn try_current_position(&self) -> Result<Coordinate, LocationError> {
        let provider = self.provider.as_ref().ok_or(LocationError::Unsupported)?;

        if let Some(cached) = self.fresh_cached() {
            tracing::trace!("Using cached position {}", cached);
            return Ok(cached);
        }

        let coordinate = tokio::time::timeout(self.options.timeout, provider.locate(&self.options))
            .await
            .map_err(|_| LocationError::Timeout)??;

        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedReading {
            coordinate,
            read_at: Instant::now(),
        });

        Ok(coordinate)
    }

    fn fresh_cached(&self) -> Option<Coordinate> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .filter(|c| c.read_at.elapsed() <= self.options.maximum_age)
            .map(|c| c.coordinate)
    }
}
