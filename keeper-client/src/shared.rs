//! Shared session publication.
//!
//! The session lives in a `tokio::sync::watch` channel. Every mutation goes
//! through [`SharedSession::update`], so readers always see a consistent
//! snapshot and watchers are woken once per real change.

use std::sync::Arc;

use keeper_core::{PhaseAction, PhaseEvent, SessionState};
use tokio::sync::watch;

/// Handle to the session state.
///
/// Cheap to clone. All clones refer to the same session.
#[derive(Debug, Clone)]
pub struct SharedSession {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for SharedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSession {
    /// Create a session in the Disconnected phase.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::new());
        Self { tx: Arc::new(tx) }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Mutate the state atomically and return what `f` returns.
    ///
    /// Watchers are only notified when the state actually changed.
    pub fn update<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let mut output = None;
        self.tx.send_if_modified(|state| {
            let before = state.clone();
            output = Some(f(state));
            *state != before
        });
        output.unwrap_or_else(|| unreachable!("send_if_modified runs its closure exactly once"))
    }

    /// Feed a phase event through the state machine.
    ///
    /// Returns the actions the caller must execute.
    pub fn transition(&self, event: PhaseEvent) -> Vec<PhaseAction> {
        self.update(|state| {
            let (next, actions) = std::mem::take(state).on_event(event);
            *state = next;
            actions
        })
    }
}
