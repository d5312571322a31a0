//! Simulation controller for boxsim.
//!
//! A [`Simulation`] owns one simulator session and the motor and sensory
//! primitives built from a [`BoxConfig`](boxsim_core::config::BoxConfig).
//! Each call to [`execute_order`](Simulation::execute_order) runs one trial:
//! the order becomes a motor command, the simulator runs it, and the sensor
//! readings come back as a bounded effect vector.
//!
//! # Example
//!
//! ```no_run
//! use boxsim_core::config::BoxConfig;
//! use boxsim_sim::Simulation;
//!
//! let config = BoxConfig::from_file("boxsim.toml").unwrap();
//! let mut sim = Simulation::new(config).unwrap();
//! let order = vec![0.5; sim.m_bounds().len()];
//! let effect = sim.execute_order(&order).unwrap();
//! println!("{effect:?}");
//! sim.close();
//! ```

pub mod error;
pub mod simulation;
pub mod stats;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::SimError;
pub use simulation::{BoundsWaiver, Simulation};
pub use stats::TrialStats;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::{BoundsWaiver, SimError, Simulation, TrialStats};

    pub use boxsim_core::prelude::*;
    pub use boxsim_prims::prelude::*;
}
