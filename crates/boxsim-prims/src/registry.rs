//! The closed set of primitives selectable from configuration.
//!
//! Sensory chains are built inside out: base variant, then
//! [`UniformizeSensory`] when `uniformize` is set, then [`Filter`] when a
//! filter is configured. Every error here is a [`ConfigError`] raised before
//! any simulator is launched.

use boxsim_core::config::{BoxConfig, MotorConfig, MotorKind, SensoryKind};
use boxsim_core::error::ConfigError;
use tracing::debug;

use crate::motor::{CommonVelocity, FullMotor, Goto, MotorPrimitive, UniformizeMotor};
use crate::sensory::{
    Collisions, EndPos, Filter, Haptic, Hear, JointSensors, MaxVel, PassThroughTract,
    ScenePositions, SensoryPrimitive, UniformizeSensory, Visual, VocalTract,
};

pub fn build_motor(config: &MotorConfig) -> Box<dyn MotorPrimitive> {
    let base: Box<dyn MotorPrimitive> = match config.kind {
        MotorKind::CommonVelocity => Box::new(CommonVelocity::new()),
        MotorKind::Goto => Box::new(Goto::new()),
        MotorKind::FullMotor => Box::new(FullMotor::new()),
    };
    if config.uniformize {
        Box::new(UniformizeMotor::new(base))
    } else {
        base
    }
}

/// Build the configured sensory chain with the pass-through vocal tract.
pub fn build_sensory(config: &BoxConfig) -> Result<Box<dyn SensoryPrimitive>, ConfigError> {
    build_sensory_with_tract(config, Box::new(PassThroughTract))
}

/// Build the configured sensory chain, handing `tract` to a [`Hear`]
/// primitive.
///
/// The arm and toy list size the scene sensors. `tract` is dropped for every
/// variant other than `hear`.
pub fn build_sensory_with_tract(
    box_config: &BoxConfig,
    tract: Box<dyn VocalTract>,
) -> Result<Box<dyn SensoryPrimitive>, ConfigError> {
    let config = &box_config.sprimitive;
    let toys = || box_config.toys.iter().map(|t| t.name.clone());
    let joints = box_config.arm_size();
    let base: Box<dyn SensoryPrimitive> = match &config.kind {
        SensoryKind::EndPos { object_name } => Box::new(EndPos::new(object_name.as_str())),
        SensoryKind::MaxVel {
            object_name,
            max_speed,
        } => Box::new(MaxVel::new(object_name, *max_speed)),
        SensoryKind::Collisions {
            group_a,
            group_b,
            max_impulse,
        } => Box::new(Collisions::new(
            group_a.clone(),
            group_b.clone(),
            *max_impulse,
        )),
        SensoryKind::Hear { object_name, walls } => Box::new(Hear::with_tract(
            object_name.as_str(),
            walls.clone(),
            tract,
        )?),
        SensoryKind::Haptic {
            object_name,
            tip,
            max_impulse,
        } => Box::new(Haptic::new(object_name.as_str(), tip.as_str(), *max_impulse)),
        SensoryKind::Visual {
            object_name,
            grid,
            decay,
            corners,
        } => Box::new(Visual::new(object_name, *grid, *decay, *corners)),
        SensoryKind::Arm => Box::new(ScenePositions::arm()),
        SensoryKind::Toy => Box::new(ScenePositions::toys(toys())),
        SensoryKind::ArmToys => Box::new(ScenePositions::arm_and_toys(toys())),
        SensoryKind::Joints => Box::new(JointSensors::joints(joints)),
        SensoryKind::Angles => Box::new(JointSensors::angles(joints)),
        SensoryKind::FullArm => Box::new(JointSensors::full_arm(joints)),
    };

    let uniformized: Box<dyn SensoryPrimitive> = if config.uniformize {
        Box::new(UniformizeSensory::new(base))
    } else {
        base
    };

    match &config.filter {
        Some(filter) => Ok(Box::new(Filter::new(
            uniformized,
            filter.features.clone(),
            filter.factors.clone(),
        )?)),
        None => Ok(uniformized),
    }
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// The motor and sensory chains of one simulation.
pub struct Primitives {
    pub motor: Box<dyn MotorPrimitive>,
    pub sensory: Box<dyn SensoryPrimitive>,
}

impl Primitives {
    /// Build both chains from a validated configuration.
    pub fn from_config(config: &BoxConfig) -> Result<Self, ConfigError> {
        Self::with_tract(config, Box::new(PassThroughTract))
    }

    pub fn with_tract(
        config: &BoxConfig,
        tract: Box<dyn VocalTract>,
    ) -> Result<Self, ConfigError> {
        let motor = build_motor(&config.mprimitive);
        let sensory = build_sensory_with_tract(config, tract)?;
        debug!(
            motor = motor.name(),
            sensory = sensory.name(),
            features = sensory.feature_count(),
            "primitives built"
        );
        Ok(Self { motor, sensory })
    }

    /// Channels to request at configure time, deduplicated, in order.
    pub fn required_channels(&self) -> Vec<String> {
        let mut channels = self.sensory.required_channels();
        let mut seen = std::collections::HashSet::new();
        channels.retain(|c| seen.insert(c.clone()));
        channels
    }
}

impl std::fmt::Debug for Primitives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Primitives")
            .field("motor", &self.motor.name())
            .field("sensory", &self.sensory.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensory::test_support::ctx;
    use boxsim_core::types::Bound;

    const ARM: &str = r#"
        steps = 100

        [arm]
        lengths = [50.0, 50.0, 50.0]
        limit = 2.0
        max_speed = 2.0
        base_pos = [400.0, 80.0]

        [[toys]]
        name = "ball1"
        shape = "ball"
        pos = [550.0, 350.0]
        size = 40.0
        friction = 1.0
        restitution = 0.7
        density = 1.0
    "#;

    fn config(sprim: &str, mprim: &str) -> BoxConfig {
        let doc = format!("{ARM}\n[sprimitive]\n{sprim}\n\n[mprimitive]\n{mprim}\n");
        BoxConfig::from_toml_str(&doc).unwrap()
    }

    fn declared(sprim: &str, mprim: &str) -> (Primitives, Vec<Bound>, Vec<Bound>) {
        let mut prims = Primitives::from_config(&config(sprim, mprim)).unwrap();
        let mut c = ctx();
        c.arm_size = 3;
        let m = prims.motor.declare(&c);
        let s = prims.sensory.declare(&c).unwrap().bounds;
        (prims, m, s)
    }

    #[test]
    fn every_sensory_variant_builds() {
        let cases = [
            (r#"name = "endpos"
                object_name = "ball1""#, 3),
            (r#"name = "maxvel"
                object_name = "ball1"
                max_speed = 50.0"#, 2),
            (r#"name = "collisions"
                group_a = ["tip"]
                group_b = ["ball1"]
                max_impulse = 10.0"#, 5),
            (r#"name = "hear"
                object_name = "ball1"
                walls = [{ name = "floor", axis = "x" }, { name = "left", axis = "y" }, { name = "right", axis = "y" }]"#, 4),
            (r#"name = "haptic"
                object_name = "ball1"
                max_impulse = 10.0"#, 3),
            (r#"name = "visual"
                object_name = "ball1""#, 4),
            (r#"name = "arm""#, 2),
            (r#"name = "toy""#, 3),
            (r#"name = "armtoys""#, 5),
            (r#"name = "joints""#, 6),
            (r#"name = "angles""#, 3),
            (r#"name = "fullarm""#, 9),
        ];
        for (sprim, features) in cases {
            let (prims, _, bounds) = declared(sprim, r#"name = "commonvel""#);
            assert_eq!(bounds.len(), features, "{sprim}");
            assert_eq!(prims.sensory.feature_count(), features, "{sprim}");
        }
    }

    #[test]
    fn every_motor_variant_builds() {
        let endpos = r#"name = "endpos"
            object_name = "ball1""#;
        for (mprim, dims) in [
            (r#"name = "commonvel""#, 7),
            (r#"name = "goto""#, 3),
            (r#"name = "fullmotor""#, 9),
        ] {
            let (_, bounds, _) = declared(endpos, mprim);
            assert_eq!(bounds.len(), dims, "{mprim}");
        }
    }

    #[test]
    fn uniformize_flags_wrap_both_chains() {
        let (prims, m, s) = declared(
            r#"name = "endpos"
               object_name = "ball1"
               uniformize = true"#,
            r#"name = "commonvel"
               uniformize = true"#,
        );
        assert!(m.iter().all(|b| *b == Bound::UNIT));
        assert!(s.iter().all(|b| *b == Bound::UNIT));
        assert_eq!(prims.required_channels(), ["ball1_pos"]);
    }

    #[test]
    fn filter_wraps_uniformized_chain() {
        let (_, _, s) = declared(
            r#"name = "collisions"
               group_a = ["tip"]
               group_b = ["ball1"]
               max_impulse = 10.0
               uniformize = true
               filter = { features = [4, 0], factors = [[1.0, 1.0], [1.0, 2.0]] }"#,
            r#"name = "goto""#,
        );
        assert_eq!(s, vec![Bound::UNIT, Bound::new(0.0, 2.0)]);
    }

    #[test]
    fn scene_sensors_follow_arm_and_toys() {
        let (prims, _, s) = declared(r#"name = "fullarm""#, r#"name = "goto""#);
        assert_eq!(prims.required_channels(), ["joints"]);
        assert_eq!(s[..2], [Bound::new(0.0, 800.0), Bound::new(0.0, 600.0)]);
        assert_eq!(s[8], Bound::new(-std::f64::consts::PI, std::f64::consts::PI));

        let (prims, _, _) = declared(r#"name = "armtoys""#, r#"name = "goto""#);
        assert_eq!(prims.required_channels(), ["tip_pos", "ball1_pos"]);

        let cfg = config(
            r#"name = "toy"
               filter = { features = [2, 0] }"#,
            r#"name = "goto""#,
        );
        let mut prims = Primitives::from_config(&cfg).unwrap();
        assert_eq!(prims.sensory.declare(&ctx()).unwrap().fixed, vec![true, false]);
    }

    #[test]
    fn filter_index_is_checked_at_build() {
        let cfg = config(
            r#"name = "endpos"
               object_name = "ball1"
               filter = { features = [0, 3] }"#,
            r#"name = "goto""#,
        );
        assert!(matches!(
            Primitives::from_config(&cfg),
            Err(ConfigError::FeatureIndexOutOfRange { index: 3, len: 3 })
        ));
    }
}
