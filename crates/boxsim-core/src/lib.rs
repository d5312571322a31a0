// boxsim-core: shared types, configuration tree and errors for the boxsim client.

pub mod config;
pub mod error;
pub mod types;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{
        ARM_TIP, ArmConfig, BoxConfig, ComConfig, FilterConfig, MotorConfig, MotorKind,
        NoiseConfig, NoiseKind, SensoryConfig, SensoryKind, ShapeKind, ToyConfig, WallAxis,
        WallConfig, WorldConfig,
    };
    pub use crate::error::{ConfigError, SensorError, ValidationError};
    pub use crate::types::{
        Bound, COLLISIONS_CHANNEL, Channel, Collision, Declaration, FeatureVector, MotorCommand,
        JOINTS_CHANNEL, SensorReadings, SimContext, Workspace, first_violation, pos_channel,
        vel_channel,
    };
}
