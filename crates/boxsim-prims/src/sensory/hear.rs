use boxsim_core::config::{WallAxis, WallConfig};
use boxsim_core::error::{ConfigError, SensorError};
use boxsim_core::types::{
    Bound, COLLISIONS_CHANNEL, Collision, Declaration, FeatureVector, SensorReadings, SimContext,
    Workspace,
};

use super::{SensoryPrimitive, undeclared};

/// Mouth parameters fed to the tract when fewer than three wall contacts occur.
const NEUTRAL_MOUTH: [f64; 3] = [0.5; 3];

// ---------------------------------------------------------------------------
// VocalTract
// ---------------------------------------------------------------------------

/// Maps three mouth parameters in `[0, 1]` to perceptual features.
pub trait VocalTract: Send {
    /// One bound per produced feature.
    fn bounds(&self) -> Vec<Bound>;

    fn articulate(&self, mouth: [f64; 3]) -> Result<Vec<f64>, SensorError>;
}

/// Returns the mouth parameters unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughTract;

impl VocalTract for PassThroughTract {
    fn bounds(&self) -> Vec<Bound> {
        vec![Bound::UNIT; 3]
    }

    fn articulate(&self, mouth: [f64; 3]) -> Result<Vec<f64>, SensorError> {
        Ok(mouth.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Hear
// ---------------------------------------------------------------------------

/// Sound made by an object bouncing against three walls.
///
/// The first three contacts between the object and any of the walls are
/// projected on the axis their wall spans and normalized against the
/// workspace. Exactly three contacts articulate those positions; anything
/// else articulates a neutral mouth. A success flag is appended.
pub struct Hear {
    object: String,
    walls: Vec<WallConfig>,
    tract: Box<dyn VocalTract>,
    workspace: Option<Workspace>,
}

impl Hear {
    pub fn new(object: impl Into<String>, walls: Vec<WallConfig>) -> Result<Self, ConfigError> {
        Self::with_tract(object, walls, Box::new(PassThroughTract))
    }

    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] unless exactly three walls are given.
    pub fn with_tract(
        object: impl Into<String>,
        walls: Vec<WallConfig>,
        tract: Box<dyn VocalTract>,
    ) -> Result<Self, ConfigError> {
        if walls.len() != 3 {
            return Err(ConfigError::invalid(
                "sprimitive.walls",
                format!("expected 3 walls, got {}", walls.len()),
            ));
        }
        Ok(Self {
            object: object.into(),
            walls,
            tract,
            workspace: None,
        })
    }

    /// Normalized wall coordinate of a contact, if it is one of ours.
    fn project(&self, c: &Collision, ws: &Workspace) -> Option<f64> {
        let wall = self.walls.iter().find(|w| c.involves(&self.object, &w.name))?;
        let v = match wall.axis {
            WallAxis::X => ws.x.to_unit(c.point.x),
            WallAxis::Y => ws.y.to_unit(c.point.y),
        };
        Some(v.clamp(0.0, 1.0))
    }
}

impl std::fmt::Debug for Hear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hear")
            .field("object", &self.object)
            .field("walls", &self.walls)
            .finish_non_exhaustive()
    }
}

impl SensoryPrimitive for Hear {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "Hear"
    }

    fn feature_count(&self) -> usize {
        self.tract.bounds().len() + 1
    }

    fn required_channels(&self) -> Vec<String> {
        vec![COLLISIONS_CHANNEL.to_string()]
    }

    fn declare(&mut self, ctx: &SimContext) -> Result<Declaration, ConfigError> {
        self.workspace = Some(ctx.workspace);
        let mut bounds = self.tract.bounds();
        bounds.push(Bound::UNIT);
        let flag = bounds.len() - 1;
        Ok(Declaration::new(bounds).with_fixed(flag))
    }

    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError> {
        let ws = self.workspace.as_ref().ok_or_else(|| undeclared(self))?;
        let contacts: Vec<f64> = readings
            .collisions()?
            .iter()
            .filter_map(|c| self.project(c, ws))
            .take(3)
            .collect();

        let (mouth, flag) = match contacts[..] {
            [a, b, c] => ([a, b, c], 1.0),
            _ => (NEUTRAL_MOUTH, 0.0),
        };
        let mut features = self.tract.articulate(mouth)?;
        features.push(flag);
        Ok(FeatureVector::new(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensory::test_support::ctx;
    use boxsim_core::types::Channel;
    use nalgebra::Vector2;

    fn walls() -> Vec<WallConfig> {
        vec![
            WallConfig {
                name: "floor".into(),
                axis: WallAxis::X,
            },
            WallConfig {
                name: "left".into(),
                axis: WallAxis::Y,
            },
            WallConfig {
                name: "right".into(),
                axis: WallAxis::Y,
            },
        ]
    }

    fn contact(a: &str, b: &str, x: f64, y: f64) -> Collision {
        Collision {
            a: a.into(),
            b: b.into(),
            point: Vector2::new(x, y),
            impulse: Vector2::zeros(),
        }
    }

    fn readings(list: Vec<Collision>) -> SensorReadings {
        SensorReadings::new().with(COLLISIONS_CHANNEL, Channel::Collisions(list))
    }

    fn hear() -> Hear {
        let mut h = Hear::new("ball1", walls()).unwrap();
        h.declare(&ctx()).unwrap();
        h
    }

    #[test]
    fn three_contacts_are_articulated() {
        let fv = hear()
            .process_sensors(&readings(vec![
                contact("ball1", "floor", 400.0, 0.0),
                contact("tip", "ball1", 10.0, 10.0),
                contact("left", "ball1", 0.0, 150.0),
                contact("ball1", "right", 800.0, 600.0),
                contact("ball1", "floor", 0.0, 0.0),
            ]))
            .unwrap();
        assert_eq!(fv.as_slice(), &[0.5, 0.25, 1.0, 1.0]);
    }

    #[test]
    fn too_few_contacts_are_neutral() {
        let fv = hear()
            .process_sensors(&readings(vec![contact("ball1", "floor", 800.0, 0.0)]))
            .unwrap();
        assert_eq!(fv.as_slice(), &[0.5, 0.5, 0.5, 0.0]);
    }

    #[test]
    fn declaration_appends_flag() {
        let mut h = Hear::new("ball1", walls()).unwrap();
        assert_eq!(h.feature_count(), 4);
        let decl = h.declare(&ctx()).unwrap();
        assert_eq!(decl.bounds, vec![Bound::UNIT; 4]);
        assert_eq!(decl.fixed, vec![false, false, false, true]);
    }

    #[test]
    fn wrong_wall_count_is_config_error() {
        assert!(matches!(
            Hear::new("ball1", walls()[..2].to_vec()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    struct Doubling;

    impl VocalTract for Doubling {
        fn bounds(&self) -> Vec<Bound> {
            vec![Bound::new(0.0, 6.0)]
        }

        fn articulate(&self, mouth: [f64; 3]) -> Result<Vec<f64>, SensorError> {
            Ok(vec![2.0 * mouth.iter().sum::<f64>()])
        }
    }

    #[test]
    fn custom_tract_shapes_output() {
        let mut h = Hear::with_tract("ball1", walls(), Box::new(Doubling)).unwrap();
        let decl = h.declare(&ctx()).unwrap();
        assert_eq!(decl.bounds, vec![Bound::new(0.0, 6.0), Bound::UNIT]);
        let fv = h.process_sensors(&readings(vec![])).unwrap();
        assert_eq!(fv.as_slice(), &[3.0, 0.0]);
    }
}
