use boxsim_core::error::{ConfigError, SensorError};
use boxsim_core::types::{
    Bound, COLLISIONS_CHANNEL, Collision, Declaration, FeatureVector, SensorReadings, SimContext,
};
use nalgebra::Vector2;

use super::{SensoryPrimitive, undeclared};

/// First contact between two groups of objects.
///
/// Produces `[x, y, impulse_x, impulse_y, hit]`. The impulse is seen from
/// group A's side: it is negated when the record lists the B object first.
/// Without a matching contact every value sits at the centre of its bound and
/// `hit` is `0.0`.
#[derive(Debug, Clone)]
pub struct Collisions {
    group_a: Vec<String>,
    group_b: Vec<String>,
    max_impulse: f64,
    bounds: Option<Vec<Bound>>,
}

impl Collisions {
    pub fn new(group_a: Vec<String>, group_b: Vec<String>, max_impulse: f64) -> Self {
        Self {
            group_a,
            group_b,
            max_impulse,
            bounds: None,
        }
    }

    fn in_a(&self, name: &str) -> bool {
        self.group_a.iter().any(|n| n == name)
    }

    fn in_b(&self, name: &str) -> bool {
        self.group_b.iter().any(|n| n == name)
    }

    /// `(point, impulse)` of the first matching record, oriented A → B.
    fn first_match(&self, list: &[Collision]) -> Option<(Vector2<f64>, Vector2<f64>)> {
        list.iter().find_map(|c| {
            if self.in_a(&c.a) && self.in_b(&c.b) {
                Some((c.point, c.impulse))
            } else if self.in_a(&c.b) && self.in_b(&c.a) {
                Some((c.point, -c.impulse))
            } else {
                None
            }
        })
    }
}

impl SensoryPrimitive for Collisions {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "Collisions"
    }

    fn feature_count(&self) -> usize {
        5
    }

    fn required_channels(&self) -> Vec<String> {
        vec![COLLISIONS_CHANNEL.to_string()]
    }

    fn declare(&mut self, ctx: &SimContext) -> Result<Declaration, ConfigError> {
        let impulse = Bound::symmetric(self.max_impulse);
        let bounds = vec![ctx.workspace.x, ctx.workspace.y, impulse, impulse, Bound::UNIT];
        self.bounds = Some(bounds.clone());
        Ok(Declaration::new(bounds).with_fixed(4))
    }

    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError> {
        let bounds = self.bounds.as_ref().ok_or_else(|| undeclared(self))?;
        let list = readings.collisions()?;
        let features = match self.first_match(list) {
            Some((p, i)) => vec![p.x, p.y, i.x, i.y, 1.0],
            None => {
                let mut centre: Vec<f64> = bounds[..4].iter().map(Bound::center).collect();
                centre.push(0.0);
                centre
            }
        };
        Ok(FeatureVector::new(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensory::test_support::ctx;
    use boxsim_core::types::Channel;

    fn hit(a: &str, b: &str, impulse: [f64; 2]) -> Collision {
        Collision {
            a: a.into(),
            b: b.into(),
            point: Vector2::new(100.0, 200.0),
            impulse: Vector2::new(impulse[0], impulse[1]),
        }
    }

    fn prim() -> Collisions {
        let mut p = Collisions::new(vec!["tip".into()], vec!["ball1".into(), "ball2".into()], 10.0);
        p.declare(&ctx()).unwrap();
        p
    }

    fn readings(list: Vec<Collision>) -> SensorReadings {
        SensorReadings::new().with(COLLISIONS_CHANNEL, Channel::Collisions(list))
    }

    #[test]
    fn declaration_fixes_flag() {
        let mut p = Collisions::new(vec!["a".into()], vec!["b".into()], 3.0);
        let decl = p.declare(&ctx()).unwrap();
        assert_eq!(decl.bounds[2], Bound::new(-3.0, 3.0));
        assert_eq!(decl.fixed, vec![false, false, false, false, true]);
    }

    #[test]
    fn first_match_wins() {
        let fv = prim()
            .process_sensors(&readings(vec![
                hit("wall", "ball1", [9.0, 9.0]),
                hit("tip", "ball2", [1.0, -2.0]),
                hit("tip", "ball1", [5.0, 5.0]),
            ]))
            .unwrap();
        assert_eq!(fv.as_slice(), &[100.0, 200.0, 1.0, -2.0, 1.0]);
    }

    #[test]
    fn reversed_record_flips_impulse() {
        let fv = prim()
            .process_sensors(&readings(vec![hit("ball1", "tip", [1.0, -2.0])]))
            .unwrap();
        assert_eq!(fv.as_slice(), &[100.0, 200.0, -1.0, 2.0, 1.0]);
    }

    #[test]
    fn no_match_reports_centre() {
        let fv = prim()
            .process_sensors(&readings(vec![hit("ball1", "ball2", [1.0, 1.0])]))
            .unwrap();
        assert_eq!(fv.as_slice(), &[400.0, 300.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn undeclared_is_an_error() {
        let p = Collisions::new(vec!["a".into()], vec!["b".into()], 1.0);
        assert_eq!(
            p.process_sensors(&readings(vec![])),
            Err(SensorError::Undeclared("Collisions".into()))
        );
    }
}
