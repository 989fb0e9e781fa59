//! Session state machine using rust-fsm.
//!
//! ```text
//!              SignIn / Restore
//! SignedOut ─────────────────────► SignedIn ◄──────────────┐
//!     ▲                              │                     │ RefreshSucceeded
//!     │ SignOut                      │ RefreshStarted      │ RefreshAbandoned
//!     │                              ▼                     │
//!     └──────────────────────────  Refreshing ─────────────┘
//! ```
//!
//! `RefreshAbandoned` covers an explicit refresh that failed: the tokens are
//! kept and the caller decides. The auto-retry path follows it with `SignOut`.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(SignedOut)

    SignedOut => {
        SignIn => SignedIn,
        Restore => SignedIn,
        SignOut => SignedOut
    },
    SignedIn => {
        SignIn => SignedIn,
        RefreshStarted => Refreshing,
        SignOut => SignedOut
    },
    Refreshing => {
        RefreshSucceeded => SignedIn,
        RefreshAbandoned => SignedIn,
        SignIn => SignedIn,
        SignOut => SignedOut
    }
}

pub use session_machine::Input as SessionInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No tokens held.
    SignedOut,
    /// Tokens held.
    SignedIn,
    /// Tokens held and a refresh is in flight.
    Refreshing,
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        !matches!(self, AuthState::SignedOut)
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::SignedOut => AuthState::SignedOut,
            SessionMachineState::SignedIn => AuthState::SignedIn,
            SessionMachineState::Refreshing => AuthState::Refreshing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let machine = SessionMachine::new();
        assert_eq!(AuthState::from(machine.state()), AuthState::SignedOut);
    }

    #[test]
    fn test_refresh_cycle() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionInput::SignIn).unwrap();
        machine.consume(&SessionInput::RefreshStarted).unwrap();
        assert_eq!(AuthState::from(machine.state()), AuthState::Refreshing);
        machine.consume(&SessionInput::RefreshSucceeded).unwrap();
        assert_eq!(AuthState::from(machine.state()), AuthState::SignedIn);
    }

    #[test]
    fn test_refresh_requires_session() {
        let mut machine = SessionMachine::new();
        assert!(machine.consume(&SessionInput::RefreshStarted).is_err());
    }

    #[test]
    fn test_sign_out_from_refreshing() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionInput::Restore).unwrap();
        machine.consume(&SessionInput::RefreshStarted).unwrap();
        machine.consume(&SessionInput::SignOut).unwrap();
        assert_eq!(AuthState::from(machine.state()), AuthState::SignedOut);
        assert!(!AuthState::SignedOut.is_signed_in());
    }
}
