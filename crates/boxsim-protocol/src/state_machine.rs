//! Session state machine enforcing request ordering.
//!
//! A trial runs `Reset → Order → Step → Sensor` from the configured state.
//! [`SessionStateMachine::on_request`] is consulted before a frame is
//! written; a request that is not allowed never reaches the wire.
//!
//! ```text
//! Disconnected → Connecting → Connected → Configured
//!     Configured → Resetting → Ordered → Stepping → ReadingSensors → Configured
//!     (any connected state) → Disconnecting → Disconnected
//! ```

use std::fmt;

use crate::error::ProtocolError;
use crate::message::MessageKind;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Configured,
    Resetting,
    Ordered,
    Stepping,
    ReadingSensors,
    Disconnecting,
}

impl SessionState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Configured => "configured",
            Self::Resetting => "resetting",
            Self::Ordered => "ordered",
            Self::Stepping => "stepping",
            Self::ReadingSensors => "reading_sensors",
            Self::Disconnecting => "disconnecting",
        }
    }

    /// Whether a transport is open in this state.
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Connecting)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks session state and enforces valid transitions.
///
/// ```
/// use boxsim_protocol::state_machine::{SessionState, SessionStateMachine};
///
/// let sm = SessionStateMachine::new();
/// assert_eq!(sm.state(), SessionState::Disconnected);
/// ```
#[derive(Debug)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Start a connection attempt. Only valid from `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), ProtocolError> {
        match self.state {
            SessionState::Disconnected => {
                self.state = SessionState::Connecting;
                Ok(())
            }
            state => Err(ProtocolError::StateViolation {
                state,
                kind: MessageKind::Hello,
            }),
        }
    }

    /// Validate a request about to be written and advance to its in-flight
    /// state.
    pub fn on_request(&mut self, kind: MessageKind) -> Result<(), ProtocolError> {
        use SessionState as S;

        let next = match (self.state, kind) {
            (S::Connecting, MessageKind::Hello) => S::Connecting,
            (S::Connected | S::Configured, MessageKind::Configure) => self.state,
            (S::Configured, MessageKind::Reset) => S::Resetting,
            (S::Resetting, MessageKind::Order) => S::Ordered,
            (S::Ordered, MessageKind::Step) => S::Stepping,
            (S::Stepping, MessageKind::Sensor) => S::ReadingSensors,
            (
                S::Connected
                | S::Configured
                | S::Resetting
                | S::Ordered
                | S::Stepping
                | S::ReadingSensors,
                MessageKind::Bye,
            ) => S::Disconnecting,
            (state, kind) => return Err(ProtocolError::StateViolation { state, kind }),
        };
        self.state = next;
        Ok(())
    }

    /// Apply the transition completed by a response of `kind`.
    pub const fn on_response(&mut self, kind: MessageKind) {
        use SessionState as S;

        self.state = match (self.state, kind) {
            (S::Connecting, MessageKind::Hello) => S::Connected,
            (S::Connected | S::Configured, MessageKind::Configure)
            | (S::ReadingSensors, MessageKind::Sensor) => S::Configured,
            (S::Disconnecting, MessageKind::Bye) => S::Disconnected,
            (state, _) => state,
        };
    }

    /// Force `Disconnected` after a failure or teardown.
    pub const fn fail(&mut self) {
        self.state = SessionState::Disconnected;
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(sm: &mut SessionStateMachine, kind: MessageKind) {
        sm.on_request(kind).unwrap();
        sm.on_response(kind.expected_response());
    }

    fn configured() -> SessionStateMachine {
        let mut sm = SessionStateMachine::new();
        sm.begin_connect().unwrap();
        exchange(&mut sm, MessageKind::Hello);
        exchange(&mut sm, MessageKind::Configure);
        sm
    }

    #[test]
    fn starts_disconnected() {
        assert_eq!(SessionStateMachine::default().state(), SessionState::Disconnected);
    }

    #[test]
    fn handshake_then_configure() {
        let mut sm = SessionStateMachine::new();
        sm.begin_connect().unwrap();
        assert_eq!(sm.state(), SessionState::Connecting);
        exchange(&mut sm, MessageKind::Hello);
        assert_eq!(sm.state(), SessionState::Connected);
        exchange(&mut sm, MessageKind::Configure);
        assert_eq!(sm.state(), SessionState::Configured);
    }

    #[test]
    fn full_trial_cycle_returns_to_configured() {
        let mut sm = configured();
        let walk = [
            (MessageKind::Reset, SessionState::Resetting),
            (MessageKind::Order, SessionState::Ordered),
            (MessageKind::Step, SessionState::Stepping),
            (MessageKind::Sensor, SessionState::Configured),
        ];
        for (kind, after) in walk {
            exchange(&mut sm, kind);
            assert_eq!(sm.state(), after, "after {kind}");
        }
    }

    #[test]
    fn reconfigure_is_allowed_between_trials() {
        let mut sm = configured();
        exchange(&mut sm, MessageKind::Configure);
        assert_eq!(sm.state(), SessionState::Configured);
    }

    #[test]
    fn rejects_out_of_order_requests() {
        let mut sm = SessionStateMachine::new();
        sm.begin_connect().unwrap();
        exchange(&mut sm, MessageKind::Hello);
        for kind in [MessageKind::Reset, MessageKind::Order, MessageKind::Step, MessageKind::Sensor] {
            let err = sm.on_request(kind).unwrap_err();
            assert!(matches!(
                err,
                ProtocolError::StateViolation {
                    state: SessionState::Connected,
                    ..
                }
            ));
        }
        assert_eq!(sm.state(), SessionState::Connected);

        let mut sm = configured();
        sm.on_request(MessageKind::Reset).unwrap();
        assert!(sm.on_request(MessageKind::Step).is_err());
        assert!(sm.on_request(MessageKind::Configure).is_err());
    }

    #[test]
    fn nothing_allowed_while_disconnected() {
        let mut sm = SessionStateMachine::new();
        for kind in MessageKind::ALL {
            assert!(sm.on_request(kind).is_err(), "{kind} accepted");
        }
    }

    #[test]
    fn bye_from_mid_trial() {
        let mut sm = configured();
        exchange(&mut sm, MessageKind::Reset);
        exchange(&mut sm, MessageKind::Bye);
        assert_eq!(sm.state(), SessionState::Disconnected);
    }

    #[test]
    fn second_connect_rejected() {
        let mut sm = configured();
        assert!(sm.begin_connect().is_err());
        sm.fail();
        assert!(sm.begin_connect().is_ok());
    }
}
