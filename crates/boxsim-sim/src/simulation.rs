//! The simulation controller.
//!
//! Construction validates the configuration and builds every primitive before
//! the simulator is launched, so configuration mistakes never cost a process
//! start. After launch the session is configured and the primitives declare
//! their bounds against the workspace the simulator reports.

use boxsim_core::config::{ARM_TIP, BoxConfig, SensoryConfig, SensoryKind};
use boxsim_core::error::ValidationError;
use boxsim_core::types::{
    Bound, FeatureVector, MotorCommand, SensorReadings, SimContext, Workspace, first_violation,
};
use boxsim_noise::vector::OrderNoise;
use boxsim_prims::registry::Primitives;
use boxsim_protocol::conf_vector;
use boxsim_protocol::{CommandLauncher, ConfigureHeader, Launcher, Session, SessionState, Timeouts};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::error::SimError;
use crate::stats::TrialStats;

// ---------------------------------------------------------------------------
// BoundsWaiver
// ---------------------------------------------------------------------------

/// Sensory chains whose effects may leave their declared bounds.
///
/// A waived effect is clamped into bounds and logged instead of failing the
/// trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsWaiver {
    /// End position of the arm tip, which can reach past the workspace the
    /// simulator reports for toys.
    EndPosArmTip,
}

impl BoundsWaiver {
    pub fn for_sensory(config: &SensoryConfig) -> Option<Self> {
        match &config.kind {
            SensoryKind::EndPos { object_name } if object_name == ARM_TIP => {
                Some(Self::EndPosArmTip)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// One simulator session driven through motor and sensory primitives.
///
/// Dropping a `Simulation` closes its session and stops the simulator.
pub struct Simulation {
    config: BoxConfig,
    session: Session,
    prims: Primitives,
    workspace: Workspace,
    m_bounds: Vec<Bound>,
    s_bounds: Vec<Bound>,
    fixed: Vec<bool>,
    noise: Option<OrderNoise>,
    rng: ChaCha8Rng,
    waiver: Option<BoundsWaiver>,
    stats: TrialStats,
}

impl Simulation {
    /// Launch the configured simulator program and prepare it for trials.
    pub fn new(config: BoxConfig) -> Result<Self, SimError> {
        let launcher = CommandLauncher::from_config(&config.com);
        let timeouts = Timeouts::from_config(&config.com);
        Self::with_launcher(config, Box::new(launcher), timeouts)
    }

    /// Like [`new`](Self::new), starting the simulator through `launcher`.
    pub fn with_launcher(
        config: BoxConfig,
        launcher: Box<dyn Launcher>,
        timeouts: Timeouts,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let prims = Primitives::from_config(&config)?;
        Self::with_primitives(config, prims, launcher, timeouts)
    }

    /// Start a simulation around primitives built by the caller, e.g. with a
    /// custom vocal tract.
    pub fn with_primitives(
        config: BoxConfig,
        mut prims: Primitives,
        launcher: Box<dyn Launcher>,
        timeouts: Timeouts,
    ) -> Result<Self, SimError> {
        let channels = prims.required_channels();
        let (layout, conf) = conf_vector::encode(&config);

        // Any early return below drops `session`, which stops the simulator.
        let mut session = Session::new(launcher, timeouts);
        session.connect()?;
        let workspace =
            session.configure(&ConfigureHeader::from_config(&config), &conf, &channels)?;

        let ctx = SimContext {
            workspace,
            arm_size: config.arm_size(),
            joint_limit: config.arm.limit,
            max_speed: config.arm.max_speed,
        };
        let m_bounds = prims.motor.declare(&ctx);
        let declaration = prims.sensory.declare(&ctx)?;
        let noise = OrderNoise::from_config(&config.noise, &m_bounds)?;

        info!(
            motor = prims.motor.name(),
            sensory = prims.sensory.name(),
            m_dims = m_bounds.len(),
            s_dims = declaration.bounds.len(),
            layout = layout.version(),
            noise = noise.is_some(),
            "simulation ready"
        );

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            waiver: BoundsWaiver::for_sensory(&config.sprimitive),
            config,
            session,
            prims,
            workspace,
            m_bounds,
            s_bounds: declaration.bounds,
            fixed: declaration.fixed,
            noise,
            stats: TrialStats::new(),
        })
    }

    // -- Trials --

    /// Run one trial and return its effect.
    ///
    /// The order is checked against the motor bounds, perturbed if noise is
    /// configured, executed for the configured number of steps, and the
    /// readings after the run are turned into an effect. An effect outside
    /// the sensory bounds is a [`SimError::BoundsViolation`] unless a
    /// [`BoundsWaiver`] applies.
    ///
    /// Any failure once the order has reached the simulator closes the
    /// session, so the simulator is stopped before the error is returned.
    pub fn execute_order(&mut self, order: &[f64]) -> Result<FeatureVector, SimError> {
        self.check_order(order)?;
        let order = match &self.noise {
            Some(noise) => noise.perturb(order, &mut self.rng),
            None => order.to_vec(),
        };

        let command = self.prims.motor.process_order(&order)?;
        let steps = self.config.steps;
        let (_, post) = self
            .session
            .reset_and_run(&command.start_pose, &command, steps)?;

        let effect = self
            .prims
            .sensory
            .process_sensors(&post)
            .map_err(SimError::from)
            .and_then(|mut effect| {
                let waived = self.check_effect(&mut effect)?;
                Ok((effect, waived))
            });
        let (effect, waived) = match effect {
            Ok(done) => done,
            Err(e) => {
                warn!(error = %e, "trial failed, stopping simulator");
                self.session.close();
                return Err(e);
            }
        };

        self.stats.record(steps, waived);
        debug!(
            trial = self.stats.trials_completed,
            waived_ratio = self.stats.waived_ratio(),
            ?effect,
            "trial done"
        );
        Ok(effect)
    }

    /// Run a raw motor command and return the readings before and after it.
    pub fn execute_raw(
        &mut self,
        command: &MotorCommand,
    ) -> Result<(SensorReadings, SensorReadings), SimError> {
        let joints = self.config.arm_size();
        if command.joint_count() != joints {
            return Err(ValidationError::OrderDimMismatch {
                expected: 3 * joints,
                got: 3 * command.joint_count(),
            }
            .into());
        }
        let readings = self
            .session
            .reset_and_run(&command.start_pose, command, self.config.steps)?;
        Ok(readings)
    }

    fn check_order(&self, order: &[f64]) -> Result<(), ValidationError> {
        if order.len() != self.m_bounds.len() {
            return Err(ValidationError::OrderDimMismatch {
                expected: self.m_bounds.len(),
                got: order.len(),
            });
        }
        if let Some(dim) = order.iter().position(|v| !v.is_finite()) {
            return Err(ValidationError::OrderNotFinite { dim });
        }
        if let Some(dim) = first_violation(order, &self.m_bounds) {
            let b = self.m_bounds[dim];
            return Err(ValidationError::OrderOutOfBounds {
                dim,
                value: order[dim],
                min: b.min,
                max: b.max,
            });
        }
        Ok(())
    }

    /// Returns whether the effect was clamped under a waiver.
    fn check_effect(&self, effect: &mut FeatureVector) -> Result<bool, SimError> {
        let Some(index) = first_violation(effect.as_slice(), &self.s_bounds) else {
            return Ok(false);
        };
        let value = effect[index];
        let b = self.s_bounds[index];
        match self.waiver {
            Some(waiver) => {
                warn!(
                    ?waiver,
                    index,
                    value,
                    min = b.min,
                    max = b.max,
                    "effect clamped into bounds"
                );
                for (v, b) in effect.as_mut_slice().iter_mut().zip(&self.s_bounds) {
                    *v = b.clamp(*v);
                }
                Ok(true)
            }
            None => Err(SimError::BoundsViolation {
                index,
                value,
                min: b.min,
                max: b.max,
            }),
        }
    }

    // -- Lifecycle --

    /// Say goodbye to the simulator and stop it. Idempotent.
    pub fn close(&mut self) {
        self.session.close();
    }

    pub const fn session_state(&self) -> SessionState {
        self.session.state()
    }

    // -- Accessors --

    pub fn m_bounds(&self) -> &[Bound] {
        &self.m_bounds
    }

    pub fn s_bounds(&self) -> &[Bound] {
        &self.s_bounds
    }

    /// Effect features that do not depend on the order.
    pub fn fixed(&self) -> &[bool] {
        &self.fixed
    }

    pub const fn workspace(&self) -> Workspace {
        self.workspace
    }

    pub const fn config(&self) -> &BoxConfig {
        &self.config
    }

    pub const fn stats(&self) -> &TrialStats {
        &self.stats
    }

    pub const fn waiver(&self) -> Option<BoundsWaiver> {
        self.waiver
    }

    pub fn primitives(&self) -> &Primitives {
        &self.prims
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("primitives", &self.prims)
            .field("state", &self.session.state())
            .field("m_dims", &self.m_bounds.len())
            .field("s_dims", &self.s_bounds.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensory(toml: &str) -> SensoryConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn waiver_only_for_tip_end_position() {
        let tip = sensory("name = \"endpos\"\nobject_name = \"tip\"");
        assert_eq!(BoundsWaiver::for_sensory(&tip), Some(BoundsWaiver::EndPosArmTip));

        let ball = sensory("name = \"endpos\"\nobject_name = \"ball1\"");
        assert_eq!(BoundsWaiver::for_sensory(&ball), None);

        let vel = sensory("name = \"maxvel\"\nobject_name = \"tip\"\nmax_speed = 1.0");
        assert_eq!(BoundsWaiver::for_sensory(&vel), None);
    }
}
