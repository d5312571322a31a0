//! Motor primitives.
//!
//! Every variant expands an order into a full per-joint [`MotorCommand`].
//! Joint values are bounded by `[-limit, limit]` and speeds by
//! `[0, max_speed]`; speeds are additionally floored at `0.0` when the command
//! is built, so a slightly negative (noisy) speed never reaches the simulator.

use boxsim_core::error::ValidationError;
use boxsim_core::types::{Bound, MotorCommand, SimContext};

// ---------------------------------------------------------------------------
// MotorPrimitive
// ---------------------------------------------------------------------------

/// Maps an order to a raw motor command.
pub trait MotorPrimitive: Send {
    /// Human-readable name for this primitive.
    fn name(&self) -> &str;

    /// Learn the arm from `ctx` and return one bound per order dimension.
    fn declare(&mut self, ctx: &SimContext) -> Vec<Bound>;

    /// Expand `order` into a command. Fails if `order` has the wrong length.
    fn process_order(&self, order: &[f64]) -> Result<MotorCommand, ValidationError>;
}

/// Arm parameters captured at declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Arm {
    joints: usize,
    limit: f64,
    max_speed: f64,
}

impl Arm {
    const fn from_context(ctx: &SimContext) -> Self {
        Self {
            joints: ctx.arm_size,
            limit: ctx.joint_limit,
            max_speed: ctx.max_speed,
        }
    }

    const fn joint_bound(&self) -> Bound {
        Bound::symmetric(self.limit)
    }

    const fn speed_bound(&self) -> Bound {
        Bound::new(0.0, self.max_speed)
    }
}

fn declared(arm: Option<Arm>) -> Result<Arm, ValidationError> {
    arm.ok_or(ValidationError::Undeclared)
}

fn check_len(order: &[f64], expected: usize) -> Result<(), ValidationError> {
    if order.len() == expected {
        Ok(())
    } else {
        Err(ValidationError::OrderDimMismatch {
            expected,
            got: order.len(),
        })
    }
}

fn speed(v: f64) -> f64 {
    v.max(0.0)
}

// ---------------------------------------------------------------------------
// CommonVelocity
// ---------------------------------------------------------------------------

/// `2n + 1` values: start pose, end pose, one speed shared by all joints.
#[derive(Debug, Clone, Default)]
pub struct CommonVelocity {
    arm: Option<Arm>,
}

impl CommonVelocity {
    pub const fn new() -> Self {
        Self { arm: None }
    }
}

impl MotorPrimitive for CommonVelocity {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "CommonVelocity"
    }

    fn declare(&mut self, ctx: &SimContext) -> Vec<Bound> {
        let arm = Arm::from_context(ctx);
        self.arm = Some(arm);
        let mut bounds = vec![arm.joint_bound(); 2 * arm.joints];
        bounds.push(arm.speed_bound());
        bounds
    }

    fn process_order(&self, order: &[f64]) -> Result<MotorCommand, ValidationError> {
        let n = declared(self.arm)?.joints;
        check_len(order, 2 * n + 1)?;
        MotorCommand::new(
            order[..n].to_vec(),
            order[n..2 * n].to_vec(),
            vec![speed(order[2 * n]); n],
        )
    }
}

// ---------------------------------------------------------------------------
// Goto
// ---------------------------------------------------------------------------

/// `n` values: the end pose. The arm starts straight and moves at full speed.
#[derive(Debug, Clone, Default)]
pub struct Goto {
    arm: Option<Arm>,
}

impl Goto {
    pub const fn new() -> Self {
        Self { arm: None }
    }
}

impl MotorPrimitive for Goto {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "Goto"
    }

    fn declare(&mut self, ctx: &SimContext) -> Vec<Bound> {
        let arm = Arm::from_context(ctx);
        self.arm = Some(arm);
        vec![arm.joint_bound(); arm.joints]
    }

    fn process_order(&self, order: &[f64]) -> Result<MotorCommand, ValidationError> {
        let arm = declared(self.arm)?;
        check_len(order, arm.joints)?;
        MotorCommand::new(
            vec![0.0; arm.joints],
            order.to_vec(),
            vec![speed(arm.max_speed); arm.joints],
        )
    }
}

// ---------------------------------------------------------------------------
// FullMotor
// ---------------------------------------------------------------------------

/// `3n` values: start pose, end pose, per-joint speeds.
#[derive(Debug, Clone, Default)]
pub struct FullMotor {
    arm: Option<Arm>,
}

impl FullMotor {
    pub const fn new() -> Self {
        Self { arm: None }
    }
}

impl MotorPrimitive for FullMotor {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "FullMotor"
    }

    fn declare(&mut self, ctx: &SimContext) -> Vec<Bound> {
        let arm = Arm::from_context(ctx);
        self.arm = Some(arm);
        let mut bounds = vec![arm.joint_bound(); 2 * arm.joints];
        bounds.extend(std::iter::repeat_n(arm.speed_bound(), arm.joints));
        bounds
    }

    fn process_order(&self, order: &[f64]) -> Result<MotorCommand, ValidationError> {
        let n = declared(self.arm)?.joints;
        check_len(order, 3 * n)?;
        MotorCommand::new(
            order[..n].to_vec(),
            order[n..2 * n].to_vec(),
            order[2 * n..].iter().copied().map(speed).collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// UniformizeMotor
// ---------------------------------------------------------------------------

/// Accepts orders in `[0, 1]` and maps them back into the inner primitive's
/// bounds before delegating.
pub struct UniformizeMotor {
    inner: Box<dyn MotorPrimitive>,
    inner_bounds: Vec<Bound>,
}

impl UniformizeMotor {
    pub fn new(inner: Box<dyn MotorPrimitive>) -> Self {
        Self {
            inner,
            inner_bounds: Vec::new(),
        }
    }

    /// Bounds of the wrapped primitive, empty before declaration.
    pub fn inner_bounds(&self) -> &[Bound] {
        &self.inner_bounds
    }
}

impl MotorPrimitive for UniformizeMotor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn declare(&mut self, ctx: &SimContext) -> Vec<Bound> {
        self.inner_bounds = self.inner.declare(ctx);
        vec![Bound::UNIT; self.inner_bounds.len()]
    }

    fn process_order(&self, order: &[f64]) -> Result<MotorCommand, ValidationError> {
        if self.inner_bounds.is_empty() {
            return Err(ValidationError::Undeclared);
        }
        check_len(order, self.inner_bounds.len())?;
        let native: Vec<f64> = order
            .iter()
            .zip(&self.inner_bounds)
            .map(|(v, b)| b.from_unit(*v))
            .collect();
        self.inner.process_order(&native)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
