//! Session state machine for Tracker Keeper.
//!
//! [`SessionState`] is a pure value. Phase transitions (pairing, handshake,
//! disconnect) go through [`SessionState::on_event`], which returns the new
//! state plus a list of actions for the client to execute. Position updates
//! go through [`SessionState::apply_sample`], which only the monitor loop
//! calls.
//!
//! The actual timers and location reads are performed by keeper-client,
//! not by this module.

use std::time::Duration;

use keeper_types::{ConnectionPhase, Coordinate, Platform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::distance;
use crate::pairing::HANDSHAKE_DELAY;

/// Errors from session updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A sample arrived while the session was not connected.
    #[error("session is {phase}, samples are only accepted while connected")]
    NotConnected {
        /// Phase at the time the sample arrived.
        phase: ConnectionPhase,
    },
}

/// One measurement taken by the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Primary device position.
    pub primary: Coordinate,
    /// Companion device position.
    pub companion: Coordinate,
    /// Great-circle distance between the two, in meters.
    pub distance_meters: f64,
    /// When the sample was taken, in milliseconds since the Unix epoch.
    pub taken_at_ms: u64,
}

impl Sample {
    /// Measure the distance between two positions.
    pub fn measure(primary: Coordinate, companion: Coordinate, taken_at_ms: u64) -> Self {
        Self {
            primary,
            companion,
            distance_meters: distance(&primary, &companion),
            taken_at_ms,
        }
    }

    /// Check this sample against a range threshold.
    pub fn exceeds(&self, max_range_meters: f64) -> bool {
        is_out_of_range(self.distance_meters, max_range_meters)
    }
}

/// Range check. Strictly greater than, no hysteresis.
pub fn is_out_of_range(distance_meters: f64, max_range_meters: f64) -> bool {
    distance_meters > max_range_meters
}

/// Change of the out-of-range flag caused by a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeTransition {
    /// The companion just left the allowed range.
    Violated,
    /// The companion just came back within range.
    Restored,
}

/// Session state shared with presentation layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    phase: ConnectionPhase,
    platform: Platform,
    device_name: Option<String>,
    primary_position: Option<Coordinate>,
    companion_position: Option<Coordinate>,
    distance_meters: Option<f64>,
    is_out_of_range: bool,
    last_updated_at: Option<u64>,
}

impl SessionState {
    /// Create a new session in the Disconnected phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Platform of the paired primary device.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Name of the paired device, if any.
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Last primary position.
    pub fn primary_position(&self) -> Option<&Coordinate> {
        self.primary_position.as_ref()
    }

    /// Last companion position.
    pub fn companion_position(&self) -> Option<&Coordinate> {
        self.companion_position.as_ref()
    }

    /// Distance between the last two positions, in meters.
    pub fn distance_meters(&self) -> Option<f64> {
        self.distance_meters
    }

    /// Whether the last sample exceeded the configured range.
    pub fn is_out_of_range(&self) -> bool {
        self.is_out_of_range
    }

    /// When the positions were last updated, in milliseconds since the Unix epoch.
    pub fn last_updated_at(&self) -> Option<u64> {
        self.last_updated_at
    }

    /// Check if the monitor loop should be running.
    pub fn is_connected(&self) -> bool {
        self.phase.is_connected()
    }

    /// Process a phase event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions. Events that make no sense in the
    /// current phase leave the state unchanged and produce no actions.
    pub fn on_event(self, event: PhaseEvent) -> (Self, Vec<PhaseAction>) {
        match (self.phase, event) {
            (
                ConnectionPhase::Disconnected,
                PhaseEvent::PairRequested {
                    platform,
                    device_name,
                },
            ) => (
                Self {
                    phase: ConnectionPhase::Searching,
                    platform,
                    device_name: Some(device_name),
                    ..self
                },
                vec![PhaseAction::StartHandshakeTimer {
                    delay: HANDSHAKE_DELAY,
                }],
            ),

            (ConnectionPhase::Searching, PhaseEvent::HandshakeCompleted) => (
                Self {
                    phase: ConnectionPhase::Connected,
                    ..self
                },
                vec![PhaseAction::StartMonitoring],
            ),
            (ConnectionPhase::Searching, PhaseEvent::DisconnectRequested) => {
                (self.reset(), vec![PhaseAction::CancelHandshake])
            }

            (ConnectionPhase::Connected, PhaseEvent::DisconnectRequested) => {
                (self.reset(), vec![PhaseAction::StopMonitoring])
            }

            // Invalid transitions - stay in current state
            (_, _) => (self, vec![]),
        }
    }

    /// Record a sample taken by the monitor loop.
    ///
    /// Updates positions, distance, flag and timestamp together. Returns the
    /// flag transition, if the sample changed it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] and leaves the state untouched
    /// when the session is not connected. A cycle that was in flight while
    /// the user disconnected must not resurrect positions or raise the flag.
    pub fn apply_sample(
        &mut self,
        sample: &Sample,
        max_range_meters: f64,
    ) -> Result<Option<RangeTransition>, SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected { phase: self.phase });
        }

        let was_out = self.is_out_of_range;
        let now_out = sample.exceeds(max_range_meters);

        self.primary_position = Some(sample.primary);
        self.companion_position = Some(sample.companion);
        self.distance_meters = Some(sample.distance_meters);
        self.is_out_of_range = now_out;
        self.last_updated_at = Some(sample.taken_at_ms);

        Ok(match (was_out, now_out) {
            (false, true) => Some(RangeTransition::Violated),
            (true, false) => Some(RangeTransition::Restored),
            _ => None,
        })
    }

    fn reset(self) -> Self {
        Self::default()
    }
}

/// Events that drive the connection phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    /// User picked a device to pair with.
    PairRequested {
        /// Platform of the chosen device.
        platform: Platform,
        /// Name of the chosen device.
        device_name: String,
    },
    /// Simulated handshake delay elapsed.
    HandshakeCompleted,
    /// User requested disconnect.
    DisconnectRequested,
}

/// Actions to be executed by keeper-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseAction {
    /// Wait, then deliver [`PhaseEvent::HandshakeCompleted`].
    StartHandshakeTimer {
        /// Simulated handshake duration.
        delay: Duration,
    },
    /// Abandon a pending handshake.
    CancelHandshake,
    /// Sample once now and arm the recurring timer.
    StartMonitoring,
    /// Cancel the recurring timer.
    StopMonitoring,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_event() -> PhaseEvent {
        PhaseEvent::PairRequested {
            platform: Platform::Ios,
            device_name: "iPhone 15 Pro".into(),
        }
    }

    fn connected() -> SessionState {
        let (state, _) = SessionState::new().on_event(pair_event());
        let (state, _) = state.on_event(PhaseEvent::HandshakeCompleted);
        state
    }

    fn sample_at(distance_deg: f64, taken_at_ms: u64) -> Sample {
        let phone = Coordinate::new(0.0, 0.0);
        let watch = Coordinate::new(0.0, distance_deg);
        Sample::measure(phone, watch, taken_at_ms)
    }

    // ===========================================
    // Phase transition tests
    // ===========================================

    #[test]
    fn starts_disconnected() {
        let state = SessionState::new();
        assert_eq!(state.phase(), ConnectionPhase::Disconnected);
        assert!(!state.is_out_of_range());
        assert!(state.distance_meters().is_none());
        assert!(state.last_updated_at().is_none());
    }

    #[test]
    fn pair_request_transitions_to_searching() {
        let (state, actions) = SessionState::new().on_event(pair_event());

        assert_eq!(state.phase(), ConnectionPhase::Searching);
        assert_eq!(state.platform(), Platform::Ios);
        assert_eq!(state.device_name(), Some("iPhone 15 Pro"));
        assert_eq!(
            actions,
            vec![PhaseAction::StartHandshakeTimer {
                delay: HANDSHAKE_DELAY
            }]
        );
    }

    #[test]
    fn handshake_transitions_to_connected() {
        let (state, _) = SessionState::new().on_event(pair_event());
        let (state, actions) = state.on_event(PhaseEvent::HandshakeCompleted);

        assert!(state.is_connected());
        assert_eq!(actions, vec![PhaseAction::StartMonitoring]);
    }

    #[test]
    fn disconnect_clears_positions_and_flag() {
        let mut state = connected();
        state.apply_sample(&sample_at(0.01, 1_000), 50.0).unwrap();
        assert!(state.is_out_of_range());

        let (state, actions) = state.on_event(PhaseEvent::DisconnectRequested);

        assert_eq!(actions, vec![PhaseAction::StopMonitoring]);
        assert_eq!(state, SessionState::new());
    }

    #[test]
    fn disconnect_while_searching_cancels_handshake() {
        let (state, _) = SessionState::new().on_event(pair_event());
        let (state, actions) = state.on_event(PhaseEvent::DisconnectRequested);

        assert_eq!(state.phase(), ConnectionPhase::Disconnected);
        assert_eq!(actions, vec![PhaseAction::CancelHandshake]);
    }

    #[test]
    fn late_handshake_after_disconnect_is_ignored() {
        let (state, _) = SessionState::new().on_event(pair_event());
        let (state, _) = state.on_event(PhaseEvent::DisconnectRequested);
        let (state, actions) = state.on_event(PhaseEvent::HandshakeCompleted);

        assert_eq!(state.phase(), ConnectionPhase::Disconnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn pair_request_while_connected_is_ignored() {
        let state = connected();
        let (state, actions) = state.on_event(PhaseEvent::PairRequested {
            platform: Platform::Android,
            device_name: "OnePlus 11".into(),
        });

        assert_eq!(state.platform(), Platform::Ios);
        assert!(actions.is_empty());
    }

    // ===========================================
    // Sample tests
    // ===========================================

    #[test]
    fn sample_rejected_unless_connected() {
        let mut state = SessionState::new();
        let result = state.apply_sample(&sample_at(1.0, 5), 50.0);

        assert_eq!(
            result,
            Err(SessionError::NotConnected {
                phase: ConnectionPhase::Disconnected
            })
        );
        assert!(!state.is_out_of_range());
        assert!(state.primary_position().is_none());
    }

    #[test]
    fn sample_updates_all_fields_together() {
        let mut state = connected();
        let sample = sample_at(0.0001, 1_700_000_000_000);
        state.apply_sample(&sample, 50.0).unwrap();

        assert_eq!(state.primary_position(), Some(&sample.primary));
        assert_eq!(state.companion_position(), Some(&sample.companion));
        assert_eq!(state.distance_meters(), Some(sample.distance_meters));
        assert_eq!(state.last_updated_at(), Some(1_700_000_000_000));
        assert!(!state.is_out_of_range());
    }

    #[test]
    fn flag_flips_without_hysteresis() {
        let mut state = connected();
        // ~11m, ~111m, ~11m against a 50m range
        let near = sample_at(0.0001, 1);
        let far = sample_at(0.001, 2);

        assert_eq!(state.apply_sample(&near, 50.0).unwrap(), None);
        assert_eq!(
            state.apply_sample(&far, 50.0).unwrap(),
            Some(RangeTransition::Violated)
        );
        assert!(state.is_out_of_range());
        assert_eq!(state.apply_sample(&far, 50.0).unwrap(), None);
        assert_eq!(
            state.apply_sample(&near, 50.0).unwrap(),
            Some(RangeTransition::Restored)
        );
        assert!(!state.is_out_of_range());
    }

    #[test]
    fn distance_equal_to_range_is_in_range() {
        assert!(!is_out_of_range(50.0, 50.0));
        assert!(is_out_of_range(50.000_001, 50.0));
    }

    #[test]
    fn forced_companion_scenario_is_out_of_range() {
        let mut state = connected();
        let sample = Sample::measure(
            Coordinate::new(40.7128, -74.0060),
            Coordinate::new(40.7133, -74.0055),
            0,
        );
        state.apply_sample(&sample, 50.0).unwrap();

        assert!(state.is_out_of_range());
        let d = state.distance_meters().unwrap();
        assert!(d > 60.0 && d < 75.0, "got {d}");
    }

    #[test]
    fn snapshot_serializes_for_presentation() {
        let json = serde_json::to_value(connected()).unwrap();
        assert_eq!(json["phase"], "connected");
        assert_eq!(json["platform"], "ios");
        assert_eq!(json["is_out_of_range"], false);
    }
}
