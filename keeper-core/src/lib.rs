//! # keeper-core
//!
//! Pure logic for Tracker Keeper (no I/O, instant tests).
//!
//! This crate implements the geodesic math, the companion simulator and the
//! session state machine without any timers, location hardware or terminal
//! I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. Randomness is injected through [`RandomSource`] and
//! time is passed in as a timestamp, so:
//! - Tests run without mocks or async
//! - Behavior is deterministic (same input → same output)
//! - State transitions are easy to reason about
//!
//! The actual I/O (location reads, timers) is performed by `keeper-client`,
//! which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod geo;
pub mod pairing;
pub mod session;
pub mod simulator;

pub use geo::{distance, EARTH_RADIUS_METERS};
pub use pairing::{
    detect_platform, discoverable_devices, protocol_banner, HANDSHAKE_DELAY, SCAN_DELAY,
};
pub use session::{
    is_out_of_range, PhaseAction, PhaseEvent, RangeTransition, Sample, SessionError,
    SessionState,
};
pub use simulator::{
    simulate_companion, RandomSource, RngSource, SequenceSource, COMPANION_ACCURACY_METERS,
    DEFAULT_COMPANION_ALTITUDE, DRIFT_NUDGE,
};
