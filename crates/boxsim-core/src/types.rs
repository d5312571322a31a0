use std::collections::BTreeMap;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SensorError, ValidationError};

/// Name of the channel carrying the collision list in a sensor payload.
pub const COLLISIONS_CHANNEL: &str = "collisions";

/// Position-history channel name for an object.
pub fn pos_channel(object: &str) -> String {
    format!("{object}_pos")
}

/// Velocity-history channel name for an object.
pub fn vel_channel(object: &str) -> String {
    format!("{object}_vel")
}

/// Name of the channel carrying the final arm snapshot: one `[x, y, angle]`
/// row per joint, base to tip.
pub const JOINTS_CHANNEL: &str = "joints";

// ---------------------------------------------------------------------------
// Bound
// ---------------------------------------------------------------------------

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Bound {
    pub min: f64,
    pub max: f64,
}

impl Bound {
    pub const UNIT: Self = Self { min: 0.0, max: 1.0 };

    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Build a bound, rejecting `min > max` or non-finite ends.
    pub fn checked(index: usize, min: f64, max: f64) -> Result<Self, ConfigError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ConfigError::InvertedBound { index, min, max });
        }
        Ok(Self { min, max })
    }

    /// Symmetric bound `[-half, half]`.
    pub const fn symmetric(half: f64) -> Self {
        Self {
            min: -half,
            max: half,
        }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn center(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    /// Linear map from this bound to `[0, 1]`.
    pub fn to_unit(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }

    /// Linear map from `[0, 1]` back into this bound.
    pub fn from_unit(&self, unit: f64) -> f64 {
        unit * (self.max - self.min) + self.min
    }
}

impl From<[f64; 2]> for Bound {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<Bound> for [f64; 2] {
    fn from(b: Bound) -> Self {
        [b.min, b.max]
    }
}

/// Index of the first value outside its bound, if any.
pub fn first_violation(values: &[f64], bounds: &[Bound]) -> Option<usize> {
    values
        .iter()
        .zip(bounds)
        .position(|(v, b)| !b.contains(*v))
}

// ---------------------------------------------------------------------------
// FeatureVector
// ---------------------------------------------------------------------------

/// Ordered sensory features produced by a primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    data: Vec<f64>,
}

impl FeatureVector {
    pub const fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

impl std::ops::Index<usize> for FeatureVector {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        &self.data[i]
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(data: Vec<f64>) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// Declaration
// ---------------------------------------------------------------------------

/// What a sensory primitive exposes once it has seen the simulation context.
///
/// `fixed[i]` is `true` when feature `i` is an indicator whose value is a known
/// constant whenever the effect it flags is present.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub bounds: Vec<Bound>,
    pub fixed: Vec<bool>,
}

impl Declaration {
    pub fn new(bounds: Vec<Bound>) -> Self {
        let fixed = vec![false; bounds.len()];
        Self { bounds, fixed }
    }

    /// Mark feature `index` as a fixed-value indicator.
    #[must_use]
    pub fn with_fixed(mut self, index: usize) -> Self {
        if let Some(f) = self.fixed.get_mut(index) {
            *f = true;
        }
        self
    }

    pub fn feature_count(&self) -> usize {
        self.bounds.len()
    }
}

// ---------------------------------------------------------------------------
// Simulation context
// ---------------------------------------------------------------------------

/// Reachable 2D workspace reported by the simulator at configure time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Workspace {
    pub x: Bound,
    pub y: Bound,
}

impl Workspace {
    pub const fn new(x: Bound, y: Bound) -> Self {
        Self { x, y }
    }

    pub fn center(&self) -> Vector2<f64> {
        Vector2::new(self.x.center(), self.y.center())
    }

    /// Position mapped to `[0, 1]²`, clamped.
    pub fn normalize(&self, p: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            self.x.to_unit(p.x).clamp(0.0, 1.0),
            self.y.to_unit(p.y).clamp(0.0, 1.0),
        )
    }
}

/// Context handed to primitives when they declare their bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct SimContext {
    pub workspace: Workspace,
    pub arm_size: usize,
    pub joint_limit: f64,
    pub max_speed: f64,
}

// ---------------------------------------------------------------------------
// Sensor payload
// ---------------------------------------------------------------------------

/// A single contact reported by the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub a: String,
    pub b: String,
    pub point: Vector2<f64>,
    pub impulse: Vector2<f64>,
}

impl Collision {
    /// Whether this record involves `x` and `y`, in either order.
    pub fn involves(&self, x: &str, y: &str) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    /// Impulse as seen from `first`'s side of the contact.
    pub fn impulse_from(&self, first: &str) -> Vector2<f64> {
        if self.a == first { self.impulse } else { -self.impulse }
    }
}

/// A named raw sensor stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    /// Row-major history of fixed-width samples.
    Samples { width: usize, data: Vec<f64> },
    /// Contacts recorded during the trial.
    Collisions(Vec<Collision>),
}

impl Channel {
    pub fn samples(width: usize, rows: &[&[f64]]) -> Self {
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self::Samples { width, data }
    }

    fn shape_name(&self) -> String {
        match self {
            Self::Samples { width, .. } => format!("samples of width {width}"),
            Self::Collisions(_) => "collisions".into(),
        }
    }
}

/// Decoded sensor payload: channel name → stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReadings {
    channels: BTreeMap<String, Channel>,
}

impl SensorReadings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a channel. Returns the previous stream under that name, if any.
    pub fn insert(&mut self, name: impl Into<String>, channel: Channel) -> Option<Channel> {
        self.channels.insert(name.into(), channel)
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, channel: Channel) -> Self {
        self.insert(name, channel);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Channel)> {
        self.channels.iter()
    }

    fn require(&self, name: &str) -> Result<&Channel, SensorError> {
        self.channels
            .get(name)
            .ok_or_else(|| SensorError::MissingChannel(name.to_string()))
    }

    /// Rows of a samples channel that must have `width` columns.
    pub fn rows(&self, name: &str, width: usize) -> Result<Vec<&[f64]>, SensorError> {
        match self.require(name)? {
            Channel::Samples { width: w, data } if *w == width && width > 0 => {
                Ok(data.chunks_exact(width).collect())
            }
            other => Err(SensorError::ChannelShape {
                channel: name.to_string(),
                expected: format!("samples of width {width}"),
                got: other.shape_name(),
            }),
        }
    }

    /// 2D sample history of a channel (position or velocity).
    pub fn points(&self, name: &str) -> Result<Vec<Vector2<f64>>, SensorError> {
        Ok(self
            .rows(name, 2)?
            .into_iter()
            .map(|r| Vector2::new(r[0], r[1]))
            .collect())
    }

    /// The collision list.
    pub fn collisions(&self) -> Result<&[Collision], SensorError> {
        match self.require(COLLISIONS_CHANNEL)? {
            Channel::Collisions(list) => Ok(list),
            other => Err(SensorError::ChannelShape {
                channel: COLLISIONS_CHANNEL.to_string(),
                expected: "collisions".into(),
                got: other.shape_name(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MotorCommand
// ---------------------------------------------------------------------------

/// Raw per-joint command understood by the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct MotorCommand {
    pub start_pose: Vec<f64>,
    pub end_pose: Vec<f64>,
    pub max_speeds: Vec<f64>,
}

impl MotorCommand {
    pub fn new(
        start_pose: Vec<f64>,
        end_pose: Vec<f64>,
        max_speeds: Vec<f64>,
    ) -> Result<Self, ValidationError> {
        if start_pose.len() != end_pose.len() || end_pose.len() != max_speeds.len() {
            return Err(ValidationError::CommandShape {
                start: start_pose.len(),
                end: end_pose.len(),
                speeds: max_speeds.len(),
            });
        }
        Ok(Self {
            start_pose,
            end_pose,
            max_speeds,
        })
    }

    pub fn joint_count(&self) -> usize {
        self.start_pose.len()
    }

    /// `start ++ end ++ speeds`, the order payload layout.
    pub fn flatten(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(3 * self.joint_count());
        flat.extend_from_slice(&self.start_pose);
        flat.extend_from_slice(&self.end_pose);
        flat.extend_from_slice(&self.max_speeds);
        flat
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
