//! Sensory primitives.
//!
//! Each variant names the channels it needs, declares one bound per feature
//! once the workspace is known, and reduces a decoded sensor payload to a
//! [`FeatureVector`]. [`UniformizeSensory`] and [`Filter`] wrap any other
//! primitive.

mod collisions;
mod decorators;
mod endpos;
mod haptic;
mod hear;
mod maxvel;
mod scene;
mod visual;

use boxsim_core::error::{ConfigError, SensorError};
use boxsim_core::types::{Declaration, FeatureVector, SensorReadings, SimContext};

pub use collisions::Collisions;
pub use decorators::{Filter, UniformizeSensory};
pub use endpos::EndPos;
pub use haptic::Haptic;
pub use hear::{Hear, PassThroughTract, VocalTract};
pub use maxvel::MaxVel;
pub use scene::{JointSensors, ScenePositions};
pub use visual::Visual;

/// Reduces a sensor payload to a bounded feature vector.
pub trait SensoryPrimitive: Send {
    /// Human-readable name for this primitive.
    fn name(&self) -> &str;

    /// Number of features produced. Known before declaration.
    fn feature_count(&self) -> usize;

    /// Channels that must be requested from the simulator.
    fn required_channels(&self) -> Vec<String>;

    /// Learn the simulation context and declare feature bounds.
    fn declare(&mut self, ctx: &SimContext) -> Result<Declaration, ConfigError>;

    /// Turn post-trial readings into features.
    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError>;
}

fn undeclared(prim: &dyn SensoryPrimitive) -> SensorError {
    SensorError::Undeclared(prim.name().to_string())
}
