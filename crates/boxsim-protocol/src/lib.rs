//! Client side of the boxsim simulator protocol.
//!
//! - [`message`]: message kinds, payload reader/writer
//! - [`framing`]: big-endian `kind · len · body` frames
//! - [`state_machine`]: [`SessionStateMachine`] enforcing request ordering
//! - [`transport`]: TCP transport with deadline-based reads
//! - [`launcher`]: spawning and terminating the simulator process
//! - [`session`]: [`Session`], one process and one connection
//! - [`conf_vector`]: flattening the configuration tree for Configure/Reset
//! - [`sensors`]: sensor payload codec
//!
//! A session is strictly request/response: one frame out, one frame back,
//! never pipelined.

pub mod conf_vector;
pub mod error;
pub mod framing;
pub mod launcher;
pub mod message;
pub mod sensors;
pub mod session;
pub mod state_machine;
pub mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use conf_vector::{ConfLayout, DecodedConf, DecodedToy};
pub use error::{ProtocolError, SessionError};
pub use launcher::{CommandLauncher, LaunchError, Launcher, SimHandle};
pub use message::{MAX_BODY_SIZE, Message, MessageKind, PayloadReader, PayloadWriter, Value};
pub use session::{ConfigureHeader, Session, Timeouts};
pub use state_machine::{SessionState, SessionStateMachine};

pub mod prelude {
    pub use crate::{
        CommandLauncher, ConfLayout, ConfigureHeader, LaunchError, Launcher, Message, MessageKind,
        ProtocolError, Session, SessionError, SessionState, SimHandle, Timeouts, Value,
    };
}
