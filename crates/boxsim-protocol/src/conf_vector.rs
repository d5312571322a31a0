//! Configuration vector encoding.
//!
//! The simulator receives arm geometry and toys as one positional vector:
//!
//! ```text
//! arm_size:int  lengths:double*arm_size  limit:double  base_x:int  base_y:int
//! toy_count:int
//! per toy: shape:int  x:int  y:int  size  friction  restitution  density
//!          [linear_damping  angular_damping]        (Damped layout only)
//! ```
//!
//! Positions are truncated toward zero. The layout is chosen per session:
//! [`ConfLayout::Damped`] as soon as one toy declares a damping term, in
//! which case every toy carries both fields (missing ones encode as `0.0`).

use boxsim_core::config::{ArmConfig, BoxConfig, ShapeKind, ToyConfig};

use crate::error::ProtocolError;
use crate::message::Value;

/// Fields shared by every layout besides the per-segment lengths.
const HEADER_FIELDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfLayout {
    /// Version 1: 7 fields per toy.
    Compact,
    /// Version 2: 9 fields per toy, damping pair appended.
    Damped,
}

impl ConfLayout {
    pub fn for_config(config: &BoxConfig) -> Self {
        Self::for_toys(&config.toys)
    }

    pub fn for_toys(toys: &[ToyConfig]) -> Self {
        if toys.iter().any(ToyConfig::has_damping) {
            Self::Damped
        } else {
            Self::Compact
        }
    }

    pub const fn version(self) -> u32 {
        match self {
            Self::Compact => 1,
            Self::Damped => 2,
        }
    }

    pub const fn fields_per_toy(self) -> usize {
        match self {
            Self::Compact => 7,
            Self::Damped => 9,
        }
    }

    /// Vector length for an arm of `arm_size` segments and `toy_count` toys.
    pub const fn expected_len(self, arm_size: usize, toy_count: usize) -> usize {
        HEADER_FIELDS + arm_size + self.fields_per_toy() * toy_count
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[allow(clippy::cast_possible_truncation)] // positions are sent as truncated ints
fn trunc(v: f64) -> i32 {
    v as i32
}

fn count(n: usize) -> Value {
    Value::Int(i32::try_from(n).unwrap_or(i32::MAX))
}

/// Encode a configuration with the layout it requires.
pub fn encode(config: &BoxConfig) -> (ConfLayout, Vec<Value>) {
    let layout = ConfLayout::for_config(config);
    (layout, encode_with(&config.arm, &config.toys, layout))
}

/// Encode with an explicit layout. A Compact encoding drops damping terms.
pub fn encode_with(arm: &ArmConfig, toys: &[ToyConfig], layout: ConfLayout) -> Vec<Value> {
    let mut out = Vec::with_capacity(layout.expected_len(arm.lengths.len(), toys.len()));

    out.push(count(arm.lengths.len()));
    out.extend(arm.lengths.iter().map(|l| Value::Double(*l)));
    out.push(Value::Double(arm.limit));
    out.push(Value::Int(trunc(arm.base_pos[0])));
    out.push(Value::Int(trunc(arm.base_pos[1])));

    out.push(count(toys.len()));
    for toy in toys {
        out.push(Value::Int(toy.shape.code()));
        out.push(Value::Int(trunc(toy.pos[0])));
        out.push(Value::Int(trunc(toy.pos[1])));
        out.push(Value::Double(toy.size));
        out.push(Value::Double(toy.friction));
        out.push(Value::Double(toy.restitution));
        out.push(Value::Double(toy.density));
        if layout == ConfLayout::Damped {
            out.push(Value::Double(toy.linear_damping.unwrap_or(0.0)));
            out.push(Value::Double(toy.angular_damping.unwrap_or(0.0)));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToy {
    pub shape: ShapeKind,
    pub pos: [i32; 2],
    pub size: f64,
    pub friction: f64,
    pub restitution: f64,
    pub density: f64,
    /// `(linear, angular)`, present in the Damped layout.
    pub damping: Option<(f64, f64)>,
}

/// Arm geometry and toys recovered from a configuration vector.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedConf {
    pub lengths: Vec<f64>,
    pub limit: f64,
    pub base_pos: [i32; 2],
    pub toys: Vec<DecodedToy>,
}

struct Cursor<'a> {
    values: &'a [Value],
    pos: usize,
}

impl Cursor<'_> {
    fn next(&mut self) -> Result<Value, ProtocolError> {
        let v = self.values.get(self.pos).copied().ok_or_else(|| {
            ProtocolError::malformed(format!(
                "configuration vector ends at field {}",
                self.pos
            ))
        })?;
        self.pos += 1;
        Ok(v)
    }

    fn int(&mut self) -> Result<i32, ProtocolError> {
        let at = self.pos;
        self.next()?.as_int().ok_or_else(|| {
            ProtocolError::malformed(format!("configuration field {at} should be an int"))
        })
    }

    fn double(&mut self) -> Result<f64, ProtocolError> {
        let at = self.pos;
        self.next()?.as_double().ok_or_else(|| {
            ProtocolError::malformed(format!("configuration field {at} should be a double"))
        })
    }

    fn count(&mut self) -> Result<usize, ProtocolError> {
        let n = self.int()?;
        usize::try_from(n).map_err(|_| ProtocolError::malformed(format!("negative count {n}")))
    }
}

/// Decode a configuration vector encoded with `layout`.
pub fn decode(values: &[Value], layout: ConfLayout) -> Result<DecodedConf, ProtocolError> {
    let mut c = Cursor { values, pos: 0 };

    let arm_size = c.count()?;
    let lengths = (0..arm_size).map(|_| c.double()).collect::<Result<Vec<_>, _>>()?;
    let limit = c.double()?;
    let base_pos = [c.int()?, c.int()?];

    let toy_count = c.count()?;
    let expected = layout.expected_len(arm_size, toy_count);
    if values.len() != expected {
        return Err(ProtocolError::malformed(format!(
            "configuration vector has {} fields, expected {expected}",
            values.len()
        )));
    }

    let mut toys = Vec::with_capacity(toy_count);
    for _ in 0..toy_count {
        let code = c.int()?;
        let shape = ShapeKind::from_code(code)
            .ok_or_else(|| ProtocolError::malformed(format!("unknown shape code {code}")))?;
        let pos = [c.int()?, c.int()?];
        let size = c.double()?;
        let friction = c.double()?;
        let restitution = c.double()?;
        let density = c.double()?;
        let damping = match layout {
            ConfLayout::Compact => None,
            ConfLayout::Damped => Some((c.double()?, c.double()?)),
        };
        toys.push(DecodedToy {
            shape,
            pos,
            size,
            friction,
            restitution,
            density,
            damping,
        });
    }

    Ok(DecodedConf {
        lengths,
        limit,
        base_pos,
        toys,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
