//! Capture session state machine.
//!
//! Enforces valid state transitions for a capture session:
//! - Idle -> Requesting (permission prompt / device handshake pending)
//! - Requesting -> Active (stream acquired)
//! - Active -> Finalizing (audio: flushing recorded chunks)
//! - Finalizing -> Stopped (audio blob assembled)
//! - Requesting -> Stopped (denied, failed, or closed while pending)
//! - Active -> Stopped (photo taken, or cancelled)
//! - Idle -> Stopped (closed before opening)

use std::fmt;

use crate::error::CaptureError;

/// Lifecycle state of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    /// Created, no device requested yet.
    Idle,
    /// Waiting on the permission prompt or device handshake.
    Requesting,
    /// Owns a live device stream.
    Active,
    /// Tracks stopped, recorded chunks being flushed into a blob.
    Finalizing,
    /// All device tracks released. Terminal.
    Stopped,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Requesting => write!(f, "Requesting"),
            CaptureState::Active => write!(f, "Active"),
            CaptureState::Finalizing => write!(f, "Finalizing"),
            CaptureState::Stopped => write!(f, "Stopped"),
        }
    }
}

impl CaptureState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &CaptureState) -> bool {
        matches!(
            (self, target),
            (CaptureState::Idle, CaptureState::Requesting)
                | (CaptureState::Requesting, CaptureState::Active)
                | (CaptureState::Active, CaptureState::Finalizing)
                | (CaptureState::Finalizing, CaptureState::Stopped)
                // Early exits
                | (CaptureState::Idle, CaptureState::Stopped)
                | (CaptureState::Requesting, CaptureState::Stopped)
                | (CaptureState::Active, CaptureState::Stopped)
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == CaptureState::Stopped
    }
}

/// Validated state holder owned by a single session.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: CaptureState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
        }
    }

    pub fn current(&self) -> CaptureState {
        self.state
    }

    /// Attempt to transition to the target state.
    pub fn transition(&mut self, target: CaptureState) -> Result<(), CaptureError> {
        if self.state.can_transition_to(&target) {
            tracing::debug!("Capture state: {} -> {}", self.state, target);
            self.state = target;
            Ok(())
        } else {
            Err(CaptureError::InvalidState {
                from: self.state,
                to: target,
            })
        }
    }

    /// Move to `Stopped` from any state. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        tracing::debug!("Capture state: {} -> {}", self.state, CaptureState::Stopped);
        self.state = CaptureState::Stopped;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(CaptureState::Idle.to_string(), "Idle");
        assert_eq!(CaptureState::Requesting.to_string(), "Requesting");
        assert_eq!(CaptureState::Active.to_string(), "Active");
        assert_eq!(CaptureState::Finalizing.to_string(), "Finalizing");
        assert_eq!(CaptureState::Stopped.to_string(), "Stopped");
    }

    #[test]
    fn test_valid_transitions() {
        assert!(CaptureState::Idle.can_transition_to(&CaptureState::Requesting));
        assert!(CaptureState::Requesting.can_transition_to(&CaptureState::Active));
        assert!(CaptureState::Active.can_transition_to(&CaptureState::Finalizing));
        assert!(CaptureState::Finalizing.can_transition_to(&CaptureState::Stopped));

        assert!(CaptureState::Idle.can_transition_to(&CaptureState::Stopped));
        assert!(CaptureState::Requesting.can_transition_to(&CaptureState::Stopped));
        assert!(CaptureState::Active.can_transition_to(&CaptureState::Stopped));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!CaptureState::Idle.can_transition_to(&CaptureState::Active));
        assert!(!CaptureState::Requesting.can_transition_to(&CaptureState::Finalizing));
        assert!(!CaptureState::Finalizing.can_transition_to(&CaptureState::Active));
        assert!(!CaptureState::Active.can_transition_to(&CaptureState::Requesting));

        // Stopped is terminal
        assert!(!CaptureState::Stopped.can_transition_to(&CaptureState::Idle));
        assert!(!CaptureState::Stopped.can_transition_to(&CaptureState::Requesting));
        assert!(!CaptureState::Stopped.can_transition_to(&CaptureState::Stopped));
    }

    #[test]
    fn test_state_machine_audio_path() {
        let mut sm = StateMachine::new();
        sm.transition(CaptureState::Requesting).unwrap();
        sm.transition(CaptureState::Active).unwrap();
        sm.transition(CaptureState::Finalizing).unwrap();
        sm.transition(CaptureState::Stopped).unwrap();
        assert!(sm.current().is_terminal());
    }

    #[test]
    fn test_state_machine_invalid_transition_keeps_state() {
        let mut sm = StateMachine::new();
        let err = sm.transition(CaptureState::Finalizing).unwrap_err();
        match err {
            CaptureError::InvalidState { from, to } => {
                assert_eq!(from, CaptureState::Idle);
                assert_eq!(to, CaptureState::Finalizing);
            }
            other => panic!("Expected InvalidState, got {:?}", other),
        }
        assert_eq!(sm.current(), CaptureState::Idle);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut sm = StateMachine::new();
        sm.transition(CaptureState::Requesting).unwrap();
        assert!(sm.stop());
        assert!(!sm.stop());
        assert_eq!(sm.current(), CaptureState::Stopped);
    }
}
