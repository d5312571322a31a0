//! Motor and sensory primitives.
//!
//! A primitive is a pure mapping between a compact, named vector and the raw
//! numbers the simulator speaks, plus the bounds of the compact side:
//!
//! - [`motor`]: orders → [`MotorCommand`](boxsim_core::types::MotorCommand)
//! - [`sensory`]: [`SensorReadings`](boxsim_core::types::SensorReadings) →
//!   [`FeatureVector`](boxsim_core::types::FeatureVector)
//! - [`registry`]: the closed set of variants selectable from configuration
//!
//! Primitives learn the arm and workspace through `declare`, which must run
//! once before any order or payload is processed.

pub mod motor;
pub mod registry;
pub mod sensory;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::motor::{CommonVelocity, FullMotor, Goto, MotorPrimitive, UniformizeMotor};
    pub use crate::registry::{Primitives, build_motor, build_sensory, build_sensory_with_tract};
    pub use crate::sensory::{
        Collisions, EndPos, Filter, Haptic, Hear, JointSensors, MaxVel, PassThroughTract,
        ScenePositions, SensoryPrimitive, UniformizeSensory, Visual, VocalTract,
    };
}
