use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::launcher::LaunchError;
use crate::message::MessageKind;
use crate::state_machine::SessionState;

/// Errors in the framing, payloads or ordering of protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("expected a {expected} response, got {got}")]
    UnexpectedKind {
        expected: MessageKind,
        got: MessageKind,
    },

    #[error("unknown message kind {0}")]
    UnknownKind(i32),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("simulator reported an error: {0}")]
    Remote(String),

    #[error("{kind} is not allowed in state {state}")]
    StateViolation {
        state: SessionState,
        kind: MessageKind,
    },
}

impl ProtocolError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Errors surfaced by a [`Session`](crate::session::Session).
///
/// Every variant except [`Launch`](Self::Launch) is raised after the session
/// has been torn down.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("could not connect to the simulator at {addr} within {timeout:?}: {source}")]
    Connect {
        addr: SocketAddr,
        timeout: Duration,
        #[source]
        source: io::Error,
    },

    #[error("no {kind} response within {timeout:?}")]
    Timeout { kind: MessageKind, timeout: Duration },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("session is disconnected")]
    Disconnected,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SessionError {
    /// Classify a protocol failure raised while waiting on `kind`.
    pub(crate) fn from_exchange(err: ProtocolError, kind: MessageKind, timeout: Duration) -> Self {
        match err {
            ProtocolError::Io(e) => match e.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                    Self::Timeout { kind, timeout }
                }
                io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::NotConnected => Self::Disconnected,
                _ => Self::Io(e),
            },
            other => Self::Protocol(other),
        }
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
