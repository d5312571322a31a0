use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name under which the simulator reports the arm tip.
pub const ARM_TIP: &str = "tip";

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_step_freq() -> f64 {
    60.0
}
const fn default_step_iter() -> i32 {
    3
}
const fn default_solver_iters() -> i32 {
    20
}
fn default_program() -> String {
    "java".into()
}
fn default_artifact() -> PathBuf {
    PathBuf::from("interact.jar")
}
fn default_headless_entry() -> String {
    "experiments.interact.StandAlone".into()
}
fn default_visual_entry() -> String {
    "experiments.interact.ProcSketch".into()
}
const fn default_grace_ms() -> u64 {
    5_000
}
const fn default_connect_timeout_ms() -> u64 {
    10_000
}
const fn default_control_timeout_ms() -> u64 {
    10_000
}
const fn default_step_timeout_ms() -> u64 {
    1_000_000
}
fn default_tip() -> String {
    ARM_TIP.into()
}
const fn default_grid() -> [usize; 2] {
    [10, 10]
}
const fn default_decay() -> f64 {
    0.99
}
const fn default_corners() -> [[f64; 3]; 4] {
    [
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 1.0, 0.0],
    ]
}

// ---------------------------------------------------------------------------
// BoxConfig
// ---------------------------------------------------------------------------

/// Full configuration tree consumed once when a simulation is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxConfig {
    /// Number of simulation steps per trial.
    pub steps: u32,

    pub arm: ArmConfig,

    /// Toys, in the order used by the configuration vector and the sensors.
    #[serde(default)]
    pub toys: Vec<ToyConfig>,

    pub sprimitive: SensoryConfig,

    pub mprimitive: MotorConfig,

    #[serde(default)]
    pub com: ComConfig,

    #[serde(default)]
    pub world: WorldConfig,

    #[serde(default)]
    pub noise: NoiseConfig,

    /// Seed for the order-noise RNG.
    #[serde(default)]
    pub seed: u64,
}

impl BoxConfig {
    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps == 0 {
            return Err(ConfigError::invalid("steps", "must be > 0"));
        }
        self.arm.validate()?;

        let mut names = HashSet::new();
        for toy in &self.toys {
            toy.validate()?;
            if toy.name == ARM_TIP {
                return Err(ConfigError::invalid(
                    "toys.name",
                    format!("'{ARM_TIP}' is reserved for the arm tip"),
                ));
            }
            if !names.insert(toy.name.as_str()) {
                return Err(ConfigError::invalid(
                    "toys.name",
                    format!("duplicate toy '{}'", toy.name),
                ));
            }
        }

        self.sprimitive.validate(&names)?;
        self.noise.validate()?;
        Ok(())
    }

    pub fn arm_size(&self) -> usize {
        self.arm.lengths.len()
    }

    /// Whether the configuration vector needs per-toy damping fields.
    pub fn has_damping(&self) -> bool {
        self.toys.iter().any(ToyConfig::has_damping)
    }
}

// ---------------------------------------------------------------------------
// ArmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmConfig {
    /// Link lengths, base to tip.
    pub lengths: Vec<f64>,
    /// Joint angle limit in radians, applied symmetrically.
    pub limit: f64,
    /// Maximum rotational speed of the motors, rad/s.
    pub max_speed: f64,
    /// Position of the arm base.
    pub base_pos: [f64; 2],
    #[serde(default)]
    pub self_collisions: bool,
}

impl ArmConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.lengths.is_empty() {
            return Err(ConfigError::invalid("arm.lengths", "arm needs at least one link"));
        }
        if self.lengths.iter().any(|l| !l.is_finite() || *l < 0.0) {
            return Err(ConfigError::invalid("arm.lengths", "lengths must be finite and >= 0"));
        }
        if !self.limit.is_finite() || self.limit < 0.0 {
            return Err(ConfigError::invalid("arm.limit", "must be finite and >= 0"));
        }
        if !self.max_speed.is_finite() || self.max_speed < 0.0 {
            return Err(ConfigError::invalid("arm.max_speed", "must be finite and >= 0"));
        }
        if self.base_pos.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::invalid("arm.base_pos", "must be finite"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ToyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Ball,
    #[serde(alias = "box")]
    Cube,
}

impl ShapeKind {
    /// Integer code used in the configuration vector.
    pub const fn code(self) -> i32 {
        match self {
            Self::Ball => 0,
            Self::Cube => 1,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ball),
            1 => Some(Self::Cube),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToyConfig {
    pub name: String,
    pub shape: ShapeKind,
    pub pos: [f64; 2],
    /// Diameter for balls, side for cubes.
    pub size: f64,
    pub friction: f64,
    pub restitution: f64,
    pub density: f64,
    #[serde(default)]
    pub linear_damping: Option<f64>,
    #[serde(default)]
    pub angular_damping: Option<f64>,
}

impl ToyConfig {
    pub fn has_damping(&self) -> bool {
        self.linear_damping.is_some() || self.angular_damping.is_some()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let field = |f: &str| format!("toys.{}.{f}", self.name);
        if self.name.is_empty() {
            return Err(ConfigError::MissingField("toys.name".into()));
        }
        if self.pos.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::invalid(field("pos"), "must be finite"));
        }
        for (name, value) in [
            ("size", self.size),
            ("friction", self.friction),
            ("restitution", self.restitution),
            ("density", self.density),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field(name), "must be finite and >= 0"));
            }
        }
        for (name, value) in [
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
        ] {
            if let Some(v) = value
                && (!v.is_finite() || v < 0.0)
            {
                return Err(ConfigError::invalid(field(name), "must be finite and >= 0"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sensory primitive selection
// ---------------------------------------------------------------------------

/// Axis a wall spans; contacts on the wall are projected on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallAxis {
    X,
    Y,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallConfig {
    pub name: String,
    pub axis: WallAxis,
}

/// Closed set of sensory primitive variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum SensoryKind {
    EndPos {
        object_name: String,
    },
    MaxVel {
        object_name: String,
        max_speed: f64,
    },
    Collisions {
        group_a: Vec<String>,
        group_b: Vec<String>,
        max_impulse: f64,
    },
    Hear {
        object_name: String,
        walls: Vec<WallConfig>,
    },
    Haptic {
        object_name: String,
        #[serde(default = "default_tip")]
        tip: String,
        max_impulse: f64,
    },
    Visual {
        object_name: String,
        #[serde(default = "default_grid")]
        grid: [usize; 2],
        #[serde(default = "default_decay")]
        decay: f64,
        /// Corner colours: bottom-left, bottom-right, top-left, top-right.
        #[serde(default = "default_corners")]
        corners: [[f64; 3]; 4],
    },
    /// Final arm tip position.
    Arm,
    /// Final position and moved flag of every toy, in configuration order.
    Toy,
    /// `Arm` followed by `Toy`.
    ArmToys,
    /// Final position of every joint.
    Joints,
    /// Final angle of every joint.
    Angles,
    /// `Joints` followed by `Angles`.
    FullArm,
}

/// Feature subset with optional per-feature bound factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub features: Vec<usize>,
    #[serde(default)]
    pub factors: Option<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensoryConfig {
    #[serde(flatten)]
    pub kind: SensoryKind,
    #[serde(default)]
    pub uniformize: bool,
    #[serde(default)]
    pub filter: Option<FilterConfig>,
}

impl SensoryConfig {
    fn validate(&self, toys: &HashSet<&str>) -> Result<(), ConfigError> {
        let known = |name: &str| -> Result<(), ConfigError> {
            if name == ARM_TIP || toys.contains(name) {
                Ok(())
            } else {
                Err(ConfigError::UnknownToy(name.to_string()))
            }
        };
        match &self.kind {
            SensoryKind::EndPos { object_name } => known(object_name)?,
            SensoryKind::MaxVel {
                object_name,
                max_speed,
            } => {
                known(object_name)?;
                positive("sprimitive.max_speed", *max_speed)?;
            }
            SensoryKind::Collisions {
                group_a,
                group_b,
                max_impulse,
            } => {
                if group_a.is_empty() || group_b.is_empty() {
                    return Err(ConfigError::invalid(
                        "sprimitive.group_a/group_b",
                        "both groups need at least one name",
                    ));
                }
                positive("sprimitive.max_impulse", *max_impulse)?;
            }
            SensoryKind::Hear { object_name, walls } => {
                known(object_name)?;
                if walls.len() != 3 {
                    return Err(ConfigError::invalid(
                        "sprimitive.walls",
                        format!("expected 3 walls, got {}", walls.len()),
                    ));
                }
            }
            SensoryKind::Haptic {
                object_name,
                max_impulse,
                ..
            } => {
                known(object_name)?;
                positive("sprimitive.max_impulse", *max_impulse)?;
            }
            SensoryKind::Visual {
                object_name,
                grid,
                decay,
                corners,
                ..
            } => {
                known(object_name)?;
                if grid.contains(&0) {
                    return Err(ConfigError::invalid("sprimitive.grid", "cells must be > 0"));
                }
                if !(*decay > 0.0 && *decay <= 1.0) {
                    return Err(ConfigError::invalid("sprimitive.decay", "must be in (0, 1]"));
                }
                if corners.iter().flatten().any(|c| !(0.0..=1.0).contains(c)) {
                    return Err(ConfigError::invalid(
                        "sprimitive.corners",
                        "colour components must be in [0, 1]",
                    ));
                }
            }
            SensoryKind::Toy | SensoryKind::ArmToys if toys.is_empty() => {
                return Err(ConfigError::invalid(
                    "sprimitive.name",
                    "toy sensors need at least one toy",
                ));
            }
            SensoryKind::Arm
            | SensoryKind::Toy
            | SensoryKind::ArmToys
            | SensoryKind::Joints
            | SensoryKind::Angles
            | SensoryKind::FullArm => {}
        }

        if let Some(filter) = &self.filter
            && let Some(factors) = &filter.factors
            && factors.len() != filter.features.len()
        {
            return Err(ConfigError::invalid(
                "sprimitive.filter.factors",
                format!(
                    "{} factors for {} features",
                    factors.len(),
                    filter.features.len()
                ),
            ));
        }
        Ok(())
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be finite and > 0"))
    }
}

// ---------------------------------------------------------------------------
// Motor primitive selection
// ---------------------------------------------------------------------------

/// Closed set of motor primitive variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum MotorKind {
    /// Start pose, end pose and one shared speed.
    #[serde(rename = "commonvel", alias = "commonvelocity")]
    CommonVelocity,
    /// End pose only; starts from zero at full speed.
    #[serde(rename = "goto")]
    Goto,
    /// Start pose, end pose and per-joint speeds.
    #[serde(rename = "fullmotor")]
    FullMotor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    #[serde(flatten)]
    pub kind: MotorKind,
    #[serde(default)]
    pub uniformize: bool,
}

// ---------------------------------------------------------------------------
// ComConfig
// ---------------------------------------------------------------------------

/// How the external simulator is launched and talked to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComConfig {
    #[serde(default = "default_program")]
    pub program: String,
    /// Simulator artifact passed on the classpath.
    #[serde(default = "default_artifact")]
    pub artifact: PathBuf,
    /// Launch the interactive, real-time entry point instead of the headless one.
    #[serde(default)]
    pub visual: bool,
    /// Forward the simulator's stdout/stderr instead of discarding it.
    #[serde(default)]
    pub forward_output: bool,
    #[serde(default = "default_headless_entry")]
    pub headless_entry: String,
    #[serde(default = "default_visual_entry")]
    pub visual_entry: String,
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
}

impl Default for ComConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            artifact: default_artifact(),
            visual: false,
            forward_output: false,
            headless_entry: default_headless_entry(),
            visual_entry: default_visual_entry(),
            grace_ms: default_grace_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            control_timeout_ms: default_control_timeout_ms(),
            step_timeout_ms: default_step_timeout_ms(),
        }
    }
}

impl ComConfig {
    /// Entry point selected by the launch mode.
    pub fn entry(&self) -> &str {
        if self.visual {
            &self.visual_entry
        } else {
            &self.headless_entry
        }
    }
}

// ---------------------------------------------------------------------------
// WorldConfig
// ---------------------------------------------------------------------------

/// Fixed header fields of the Configure message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Simulation steps per second.
    #[serde(default = "default_step_freq")]
    pub step_freq: f64,
    /// Physics iterations per step.
    #[serde(default = "default_step_iter")]
    pub step_iter: i32,
    /// Constraint solver velocity iterations.
    #[serde(default = "default_solver_iters")]
    pub iter_vel: i32,
    /// Constraint solver position iterations.
    #[serde(default = "default_solver_iters")]
    pub iter_pos: i32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            step_freq: default_step_freq(),
            step_iter: default_step_iter(),
            iter_vel: default_solver_iters(),
            iter_pos: default_solver_iters(),
        }
    }
}

// ---------------------------------------------------------------------------
// NoiseConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseKind {
    #[default]
    Gaussian,
    Uniform,
}

/// Order perturbation. `level` is a fraction of each motor bound's width.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NoiseConfig {
    #[serde(default)]
    pub kind: NoiseKind,
    #[serde(default)]
    pub level: f64,
}

impl NoiseConfig {
    pub fn is_enabled(&self) -> bool {
        self.level > 0.0
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.level.is_finite() || self.level < 0.0 {
            return Err(ConfigError::invalid("noise.level", "must be finite and >= 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        steps = 720
        seed = 3

        [arm]
        lengths = [50.0, 50.0, 50.0, 50.0, 50.0, 50.0]
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

        [sprimitive]
        name = "endpos"
        object_name = "ball1"
        uniformize = true

        [mprimitive]
        name = "commonvel"
        uniformize = true
    "#;

    #[test]
    fn parses_sample_with_defaults() {
        let cfg = BoxConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.steps, 720);
        assert_eq!(cfg.arm_size(), 6);
        assert_eq!(cfg.toys[0].shape, ShapeKind::Ball);
        assert!(!cfg.has_damping());
        assert!(matches!(cfg.sprimitive.kind, SensoryKind::EndPos { .. }));
        assert!(cfg.sprimitive.uniformize);
        assert_eq!(cfg.mprimitive.kind, MotorKind::CommonVelocity);
        assert_eq!(cfg.com, ComConfig::default());
        assert_eq!(cfg.world, WorldConfig::default());
        assert!(!cfg.noise.is_enabled());
    }

    #[test]
    fn box_is_an_alias_for_cube() {
        let shape: ShapeKind = toml::from_str::<toml::Value>("s = \"box\"")
            .unwrap()
            .get("s")
            .cloned()
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(shape, ShapeKind::Cube);
        assert_eq!(ShapeKind::from_code(shape.code()), Some(ShapeKind::Cube));
    }

    #[test]
    fn parses_every_sensory_variant() {
        for (body, check) in [
            ("name = \"maxvel\"\nobject_name = \"ball1\"\nmax_speed = 500.0", "maxvel"),
            (
                "name = \"collisions\"\ngroup_a = [\"tip\"]\ngroup_b = [\"ball1\"]\nmax_impulse = 10.0",
                "collisions",
            ),
            (
                "name = \"hear\"\nobject_name = \"ball1\"\nwalls = [{name = \"left\", axis = \"y\"}, {name = \"top\", axis = \"x\"}, {name = \"right\", axis = \"y\"}]",
                "hear",
            ),
            ("name = \"haptic\"\nobject_name = \"ball1\"\nmax_impulse = 10.0", "haptic"),
            ("name = \"visual\"\nobject_name = \"ball1\"", "visual"),
            ("name = \"arm\"", "arm"),
            ("name = \"toy\"", "toy"),
            ("name = \"armtoys\"", "armtoys"),
            ("name = \"joints\"", "joints"),
            ("name = \"angles\"", "angles"),
            ("name = \"fullarm\"", "fullarm"),
        ] {
            let doc = SAMPLE.replace(
                "name = \"endpos\"\n        object_name = \"ball1\"",
                body,
            );
            let cfg = BoxConfig::from_toml_str(&doc).unwrap_or_else(|e| panic!("{check}: {e}"));
            let tag = match cfg.sprimitive.kind {
                SensoryKind::EndPos { .. } => "endpos",
                SensoryKind::MaxVel { .. } => "maxvel",
                SensoryKind::Collisions { .. } => "collisions",
                SensoryKind::Hear { .. } => "hear",
                SensoryKind::Haptic { ref tip, .. } => {
                    assert_eq!(tip, ARM_TIP);
                    "haptic"
                }
                SensoryKind::Visual { grid, .. } => {
                    assert_eq!(grid, default_grid());
                    "visual"
                }
                SensoryKind::Arm => "arm",
                SensoryKind::Toy => "toy",
                SensoryKind::ArmToys => "armtoys",
                SensoryKind::Joints => "joints",
                SensoryKind::Angles => "angles",
                SensoryKind::FullArm => "fullarm",
            };
            assert_eq!(tag, check);
        }
    }

    #[test]
    fn toy_sensors_need_toys() {
        let mut cfg = BoxConfig::from_toml_str(SAMPLE).unwrap();
        cfg.toys.clear();
        cfg.sprimitive.kind = SensoryKind::ArmToys;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue { .. })));
        cfg.sprimitive.kind = SensoryKind::Arm;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_object() {
        let doc = SAMPLE.replace("object_name = \"ball1\"", "object_name = \"ball9\"");
        let err = BoxConfig::from_toml_str(&doc).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownToy(ref n) if n == "ball9"));
    }

    #[test]
    fn tip_is_a_valid_object() {
        let doc = SAMPLE.replace("object_name = \"ball1\"", "object_name = \"tip\"");
        assert!(BoxConfig::from_toml_str(&doc).is_ok());
    }

    #[test]
    fn rejects_negative_limit() {
        let doc = SAMPLE.replace("limit = 2.0", "limit = -1.0");
        assert!(matches!(
            BoxConfig::from_toml_str(&doc),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_toys() {
        let mut cfg = BoxConfig::from_toml_str(SAMPLE).unwrap();
        cfg.toys.push(cfg.toys[0].clone());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_mismatched_filter_factors() {
        let mut cfg = BoxConfig::from_toml_str(SAMPLE).unwrap();
        cfg.sprimitive.filter = Some(FilterConfig {
            features: vec![0, 1],
            factors: Some(vec![[1.0, 1.0]]),
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn damping_is_detected() {
        let mut cfg = BoxConfig::from_toml_str(SAMPLE).unwrap();
        cfg.toys[0].linear_damping = Some(0.3);
        assert!(cfg.has_damping());
    }

    #[test]
    fn com_entry_follows_visual_flag() {
        let mut com = ComConfig::default();
        assert_eq!(com.entry(), "experiments.interact.StandAlone");
        com.visual = true;
        assert_eq!(com.entry(), "experiments.interact.ProcSketch");
    }

    #[test]
    fn motor_kind_aliases() {
        let doc = SAMPLE.replace("name = \"commonvel\"", "name = \"fullmotor\"");
        let cfg = BoxConfig::from_toml_str(&doc).unwrap();
        assert_eq!(cfg.mprimitive.kind, MotorKind::FullMotor);
    }
}
