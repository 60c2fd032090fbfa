//! Companion device simulator.
//!
//! Stands in for a companion telemetry channel: the companion position is
//! derived from the primary position plus random drift.
//!
//! Randomness is injected through [`RandomSource`] so callers can replay a
//! fixed sequence and assert exact offsets.

use keeper_types::Coordinate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Altitude reported for the companion when the primary has none, in meters.
pub const DEFAULT_COMPANION_ALTITUDE: f64 = 10.0;

/// Accuracy reported for the companion (a precise wrist sensor), in meters.
pub const COMPANION_ACCURACY_METERS: f64 = 5.0;

/// Upper bound of the altitude jitter added to the primary altitude.
const ALTITUDE_JITTER_METERS: f64 = 2.0;

/// Drift added by the "simulate movement" helper, in degrees (~50m+).
pub const DRIFT_NUDGE: f64 = 0.001;

/// Source of uniformly distributed numbers in `[0, 1)`.
pub trait RandomSource {
    /// Draw the next number in `[0, 1)`.
    fn next_unit(&mut self) -> f64;
}

/// [`RandomSource`] backed by any [`rand::Rng`].
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    /// Wrap an existing generator.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    /// Generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible generator for demos and tests.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed sequence of values, wrapping around at the end.
///
/// An empty sequence behaves like a constant `0.5` (zero offset).
#[derive(Debug, Clone, Default)]
pub struct SequenceSource {
    values: Vec<f64>,
    next: usize,
}

impl SequenceSource {
    /// Create a source replaying `values` in order.
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            next: 0,
        }
    }

    /// Number of values drawn so far.
    pub fn drawn(&self) -> usize {
        self.next
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.5;
        }
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}

/// Derive a companion position from the primary position.
///
/// Latitude and longitude are offset independently by values uniform in
/// `[-drift_magnitude / 2, +drift_magnitude / 2]` degrees. Altitude is the
/// primary altitude plus 0-2m of jitter, or [`DEFAULT_COMPANION_ALTITUDE`]
/// when the primary has none. Accuracy is always
/// [`COMPANION_ACCURACY_METERS`].
///
/// Draw order is latitude, longitude, then altitude (only when present).
pub fn simulate_companion<R>(primary: &Coordinate, drift_magnitude: f64, rng: &mut R) -> Coordinate
where
    R: RandomSource + ?Sized,
{
    let lat_offset = (rng.next_unit() - 0.5) * drift_magnitude;
    let lon_offset = (rng.next_unit() - 0.5) * drift_magnitude;

    let altitude = match primary.altitude {
        Some(alt) => alt + rng.next_unit() * ALTITUDE_JITTER_METERS,
        None => DEFAULT_COMPANION_ALTITUDE,
    };

    Coordinate {
        latitude: primary.latitude + lat_offset,
        longitude: primary.longitude + lon_offset,
        altitude: Some(altitude),
        accuracy: Some(COMPANION_ACCURACY_METERS),
    }
}
