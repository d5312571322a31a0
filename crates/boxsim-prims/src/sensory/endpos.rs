use boxsim_core::error::{ConfigError, SensorError};
use boxsim_core::types::{
    Bound, Declaration, FeatureVector, SensorReadings, SimContext, pos_channel,
};

use super::SensoryPrimitive;

/// Final position of an object and whether it moved.
///
/// Produces `[x, y, moved]`. `moved` is `1.0` exactly when the first and last
/// recorded positions differ (no tolerance).
#[derive(Debug, Clone)]
pub struct EndPos {
    object: String,
    channel: String,
}

impl EndPos {
    pub fn new(object: impl Into<String>) -> Self {
        let object = object.into();
        let channel = pos_channel(&object);
        Self { object, channel }
    }

    pub fn object(&self) -> &str {
        &self.object
    }
}

impl SensoryPrimitive for EndPos {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "EndPos"
    }

    fn feature_count(&self) -> usize {
        3
    }

    fn required_channels(&self) -> Vec<String> {
        vec![self.channel.clone()]
    }

    fn declare(&mut self, ctx: &SimContext) -> Result<Declaration, ConfigError> {
        Ok(Declaration::new(vec![ctx.workspace.x, ctx.workspace.y, Bound::UNIT]).with_fixed(2))
    }

    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError> {
        let points = readings.points(&self.channel)?;
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Err(SensorError::EmptyChannel(self.channel.clone()));
        };
        let moved = if first == last { 0.0 } else { 1.0 };
        Ok(FeatureVector::new(vec![last.x, last.y, moved]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensory::test_support::ctx;
    use boxsim_core::types::Channel;

    fn readings(rows: &[&[f64]]) -> SensorReadings {
        SensorReadings::new().with("ball1_pos", Channel::samples(2, rows))
    }

    #[test]
    fn declares_workspace_and_flag() {
        let mut prim = EndPos::new("ball1");
        assert_eq!(prim.required_channels(), ["ball1_pos"]);
        let decl = prim.declare(&ctx()).unwrap();
        assert_eq!(decl.bounds[0], Bound::new(0.0, 800.0));
        assert_eq!(decl.bounds[1], Bound::new(0.0, 600.0));
        assert_eq!(decl.bounds[2], Bound::UNIT);
        assert_eq!(decl.fixed, vec![false, false, true]);
        assert_eq!(decl.feature_count(), prim.feature_count());
    }

    #[test]
    fn reports_last_position() {
        let prim = EndPos::new("ball1");
        let fv = prim
            .process_sensors(&readings(&[&[10.0, 20.0], &[11.0, 20.0], &[30.0, 40.0]]))
            .unwrap();
        assert_eq!(fv.as_slice(), &[30.0, 40.0, 1.0]);
    }

    #[test]
    fn moved_flag_is_exact() {
        let prim = EndPos::new("ball1");
        let still = prim
            .process_sensors(&readings(&[&[10.0, 20.0], &[12.0, 20.0], &[10.0, 20.0]]))
            .unwrap();
        assert_eq!(still[2], 0.0);

        let nudged = prim
            .process_sensors(&readings(&[&[10.0, 20.0], &[10.0, 20.0 + 1e-12]]))
            .unwrap();
        assert_eq!(nudged[2], 1.0);

        let single = prim.process_sensors(&readings(&[&[5.0, 5.0]])).unwrap();
        assert_eq!(single[2], 0.0);
    }

    #[test]
    fn empty_history_is_an_error() {
        let prim = EndPos::new("ball1");
        assert_eq!(
            prim.process_sensors(&readings(&[])),
            Err(SensorError::EmptyChannel("ball1_pos".into()))
        );
        assert!(matches!(
            prim.process_sensors(&SensorReadings::new()),
            Err(SensorError::MissingChannel(_))
        ));
    }
}
