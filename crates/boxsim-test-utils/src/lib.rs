//! Shared test fixtures and utilities for boxsim crates.
//!
//! Provides an in-process fake simulator that speaks the wire protocol, a
//! [`Launcher`](boxsim_protocol::Launcher) that starts it, configuration
//! fixtures and deterministic RNG setup.

pub mod fake_sim;
pub mod fixtures;
pub mod logging;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fake_sim::{FakeLauncher, FakeLog, FakeLogHandle, FakeScript, Fault, Trial};
pub use fixtures::{fast_timeouts, sample_config, sample_toml};
pub use logging::init_tracing;
pub use rng::{deterministic_vec, seeded_rng};
