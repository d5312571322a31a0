use std::f64::consts::PI;

use boxsim_core::error::{ConfigError, SensorError};
use boxsim_core::types::{
    Bound, COLLISIONS_CHANNEL, Declaration, FeatureVector, SensorReadings, SimContext,
};

use super::SensoryPrimitive;

/// Strongest touch between the arm tip and an object.
///
/// Produces `[angle, norm, touched]` for the contact with the largest impulse
/// norm, the impulse taken from the tip's side. No contact gives zeros.
#[derive(Debug, Clone)]
pub struct Haptic {
    object: String,
    tip: String,
    max_impulse: f64,
}

impl Haptic {
    pub fn new(object: impl Into<String>, tip: impl Into<String>, max_impulse: f64) -> Self {
        Self {
            object: object.into(),
            tip: tip.into(),
            max_impulse,
        }
    }
}

impl SensoryPrimitive for Haptic {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "Haptic"
    }

    fn feature_count(&self) -> usize {
        3
    }

    fn required_channels(&self) -> Vec<String> {
        vec![COLLISIONS_CHANNEL.to_string()]
    }

    fn declare(&mut self, _ctx: &SimContext) -> Result<Declaration, ConfigError> {
        Ok(Declaration::new(vec![
            Bound::symmetric(PI),
            Bound::new(0.0, self.max_impulse),
            Bound::UNIT,
        ])
        .with_fixed(2))
    }

    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError> {
        let strongest = readings
            .collisions()?
            .iter()
            .filter(|c| c.involves(&self.tip, &self.object))
            .map(|c| c.impulse_from(&self.tip))
            .max_by(|a, b| a.norm().total_cmp(&b.norm()));

        let features = match strongest {
            Some(i) => vec![i.y.atan2(i.x), i.norm(), 1.0],
            None => vec![0.0, 0.0, 0.0],
        };
        Ok(FeatureVector::new(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensory::test_support::ctx;
    use boxsim_core::types::{Channel, Collision};
    use nalgebra::Vector2;

    fn touch(a: &str, b: &str, ix: f64, iy: f64) -> Collision {
        Collision {
            a: a.into(),
            b: b.into(),
            point: Vector2::new(1.0, 1.0),
            impulse: Vector2::new(ix, iy),
        }
    }

    fn readings(list: Vec<Collision>) -> SensorReadings {
        SensorReadings::new().with(COLLISIONS_CHANNEL, Channel::Collisions(list))
    }

    #[test]
    fn strongest_contact_wins() {
        let prim = Haptic::new("ball1", "tip", 10.0);
        let fv = prim
            .process_sensors(&readings(vec![
                touch("tip", "ball1", 1.0, 0.0),
                touch("ball1", "tip", 0.0, -3.0),
                touch("tip", "ball2", 9.0, 9.0),
            ]))
            .unwrap();
        assert!((fv[0] - PI / 2.0).abs() < 1e-12);
        assert!((fv[1] - 3.0).abs() < 1e-12);
        assert_eq!(fv[2], 1.0);
    }

    #[test]
    fn no_contact_is_zero() {
        let prim = Haptic::new("ball1", "tip", 10.0);
        let fv = prim.process_sensors(&readings(vec![])).unwrap();
        assert_eq!(fv.as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn declaration() {
        let mut prim = Haptic::new("ball1", "tip", 4.0);
        let decl = prim.declare(&ctx()).unwrap();
        assert_eq!(decl.bounds[0], Bound::new(-PI, PI));
        assert_eq!(decl.bounds[1], Bound::new(0.0, 4.0));
        assert_eq!(decl.fixed, vec![false, false, true]);
    }
}
