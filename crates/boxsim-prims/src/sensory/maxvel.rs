use boxsim_core::error::{ConfigError, SensorError};
use boxsim_core::types::{
    Bound, Declaration, FeatureVector, SensorReadings, SimContext, vel_channel,
};

use super::SensoryPrimitive;

/// Peak speed of an object over the trial.
///
/// Produces `[max_speed, moved]` where `max_speed` is the largest velocity
/// norm recorded and `moved` is `0.0` only when that peak is exactly zero.
#[derive(Debug, Clone)]
pub struct MaxVel {
    channel: String,
    max_speed: f64,
}

impl MaxVel {
    pub fn new(object: &str, max_speed: f64) -> Self {
        Self {
            channel: vel_channel(object),
            max_speed,
        }
    }
}

impl SensoryPrimitive for MaxVel {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "MaxVel"
    }

    fn feature_count(&self) -> usize {
        2
    }

    fn required_channels(&self) -> Vec<String> {
        vec![self.channel.clone()]
    }

    fn declare(&mut self, _ctx: &SimContext) -> Result<Declaration, ConfigError> {
        Ok(Declaration::new(vec![Bound::new(0.0, self.max_speed), Bound::UNIT]).with_fixed(1))
    }

    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError> {
        let peak = readings
            .points(&self.channel)?
            .iter()
            .map(|v| v.norm())
            .fold(0.0, f64::max);
        let moved = if peak == 0.0 { 0.0 } else { 1.0 };
        Ok(FeatureVector::new(vec![peak, moved]))
    }
}
