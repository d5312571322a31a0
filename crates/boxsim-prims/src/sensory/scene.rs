use std::f64::consts::PI;

use boxsim_core::config::ARM_TIP;
use boxsim_core::error::{ConfigError, SensorError};
use boxsim_core::types::{
    Bound, Declaration, FeatureVector, JOINTS_CHANNEL, SensorReadings, SimContext,
};

use super::{EndPos, SensoryPrimitive};

// ---------------------------------------------------------------------------
// ScenePositions
// ---------------------------------------------------------------------------

/// Final positions of the arm tip and of every toy.
///
/// Produces `[tip.x, tip.y]` when the tip is tracked, followed by
/// `[x, y, moved]` per toy in configuration order. `moved` is the exact
/// comparison [`EndPos`] uses and is marked fixed.
#[derive(Debug, Clone)]
pub struct ScenePositions {
    tip: Option<EndPos>,
    toys: Vec<EndPos>,
}

impl ScenePositions {
    pub fn arm() -> Self {
        Self {
            tip: Some(EndPos::new(ARM_TIP)),
            toys: Vec::new(),
        }
    }

    pub fn toys<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            tip: None,
            toys: names.into_iter().map(EndPos::new).collect(),
        }
    }

    pub fn arm_and_toys<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            tip: Some(EndPos::new(ARM_TIP)),
            ..Self::toys(names)
        }
    }
}

impl SensoryPrimitive for ScenePositions {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        match (&self.tip, self.toys.is_empty()) {
            (Some(_), true) => "Arm",
            (Some(_), false) => "ArmToys",
            (None, _) => "Toy",
        }
    }

    fn feature_count(&self) -> usize {
        2 * usize::from(self.tip.is_some()) + 3 * self.toys.len()
    }

    fn required_channels(&self) -> Vec<String> {
        self.tip
            .iter()
            .chain(&self.toys)
            .flat_map(EndPos::required_channels)
            .collect()
    }

    fn declare(&mut self, ctx: &SimContext) -> Result<Declaration, ConfigError> {
        let mut bounds = Vec::with_capacity(self.feature_count());
        let mut flags = Vec::new();
        if self.tip.is_some() {
            bounds.extend([ctx.workspace.x, ctx.workspace.y]);
        }
        for toy in &mut self.toys {
            let decl = toy.declare(ctx)?;
            flags.extend(
                decl.fixed
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| **f)
                    .map(|(i, _)| bounds.len() + i),
            );
            bounds.extend(decl.bounds);
        }
        Ok(flags
            .into_iter()
            .fold(Declaration::new(bounds), Declaration::with_fixed))
    }

    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError> {
        let mut features = Vec::with_capacity(self.feature_count());
        if let Some(tip) = &self.tip {
            let end = tip.process_sensors(readings)?;
            features.extend_from_slice(&end.as_slice()[..2]);
        }
        for toy in &self.toys {
            features.extend_from_slice(toy.process_sensors(readings)?.as_slice());
        }
        Ok(FeatureVector::new(features))
    }
}

// ---------------------------------------------------------------------------
// JointSensors
// ---------------------------------------------------------------------------

/// Final joint positions and/or angles from the [`JOINTS_CHANNEL`] snapshot.
///
/// Positions come first (`x, y` per joint, base to tip), then angles.
#[derive(Debug, Clone)]
pub struct JointSensors {
    arm_size: usize,
    positions: bool,
    angles: bool,
}

impl JointSensors {
    pub const fn joints(arm_size: usize) -> Self {
        Self {
            arm_size,
            positions: true,
            angles: false,
        }
    }

    pub const fn angles(arm_size: usize) -> Self {
        Self {
            arm_size,
            positions: false,
            angles: true,
        }
    }

    pub const fn full_arm(arm_size: usize) -> Self {
        Self {
            arm_size,
            positions: true,
            angles: true,
        }
    }
}

impl SensoryPrimitive for JointSensors {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        match (self.positions, self.angles) {
            (true, true) => "FullArm",
            (true, false) => "Joints",
            _ => "Angles",
        }
    }

    fn feature_count(&self) -> usize {
        self.arm_size * (2 * usize::from(self.positions) + usize::from(self.angles))
    }

    fn required_channels(&self) -> Vec<String> {
        vec![JOINTS_CHANNEL.to_string()]
    }

    fn declare(&mut self, ctx: &SimContext) -> Result<Declaration, ConfigError> {
        if ctx.arm_size != self.arm_size {
            return Err(ConfigError::invalid(
                "arm.lengths",
                format!(
                    "{} sensors built for {} joints, arm has {}",
                    self.name(),
                    self.arm_size,
                    ctx.arm_size
                ),
            ));
        }
        let mut bounds = Vec::with_capacity(self.feature_count());
        if self.positions {
            for _ in 0..self.arm_size {
                bounds.extend([ctx.workspace.x, ctx.workspace.y]);
            }
        }
        if self.angles {
            bounds.extend(std::iter::repeat_n(Bound::symmetric(PI), self.arm_size));
        }
        Ok(Declaration::new(bounds))
    }

    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError> {
        let rows = readings.rows(JOINTS_CHANNEL, 3)?;
        if rows.len() != self.arm_size {
            return Err(SensorError::ChannelShape {
                channel: JOINTS_CHANNEL.to_string(),
                expected: format!("{} joint rows", self.arm_size),
                got: format!("{} rows", rows.len()),
            });
        }
        let mut features = Vec::with_capacity(self.feature_count());
        if self.positions {
            features.extend(rows.iter().flat_map(|r| [r[0], r[1]]));
        }
        if self.angles {
            features.extend(rows.iter().map(|r| r[2]));
        }
        Ok(FeatureVector::new(features))
    }
}
