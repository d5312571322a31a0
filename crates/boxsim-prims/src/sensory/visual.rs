use boxsim_core::error::{ConfigError, SensorError};
use boxsim_core::types::{
    Bound, Declaration, FeatureVector, SensorReadings, SimContext, Workspace, pos_channel,
};
use nalgebra::{Vector2, Vector3};

use super::{SensoryPrimitive, undeclared};

/// What an observer sees of an object's trajectory.
///
/// Produces `[coverage, r, g, b]`:
/// - `coverage`: fraction of the `cols × rows` grid over the workspace whose
///   cells the object passed through.
/// - `r, g, b`: colour of the trajectory, each sample coloured by bilinear
///   interpolation of the corner colours at its normalized position and
///   weighted by `decay^age` so recent samples dominate.
#[derive(Debug, Clone)]
pub struct Visual {
    channel: String,
    grid: [usize; 2],
    decay: f64,
    /// Bottom-left, bottom-right, top-left, top-right.
    corners: [Vector3<f64>; 4],
    workspace: Option<Workspace>,
}

impl Visual {
    pub fn new(object: &str, grid: [usize; 2], decay: f64, corners: [[f64; 3]; 4]) -> Self {
        Self {
            channel: pos_channel(object),
            grid,
            decay,
            corners: corners.map(Vector3::from),
            workspace: None,
        }
    }

    fn colour_at(&self, u: &Vector2<f64>) -> Vector3<f64> {
        let [bl, br, tl, tr] = &self.corners;
        let bottom = bl * (1.0 - u.x) + br * u.x;
        let top = tl * (1.0 - u.x) + tr * u.x;
        bottom * (1.0 - u.y) + top * u.y
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn coverage(&self, unit: &[Vector2<f64>]) -> f64 {
        let [cols, rows] = self.grid;
        let mut lit = vec![false; cols * rows];
        for u in unit {
            let col = ((u.x * cols as f64) as usize).min(cols - 1);
            let row = ((u.y * rows as f64) as usize).min(rows - 1);
            lit[row * cols + col] = true;
        }
        lit.iter().filter(|l| **l).count() as f64 / lit.len() as f64
    }

    fn blend(&self, unit: &[Vector2<f64>]) -> Vector3<f64> {
        let mut weight = 1.0;
        let mut total = 0.0;
        let mut colour = Vector3::zeros();
        for u in unit.iter().rev() {
            colour += self.colour_at(u) * weight;
            total += weight;
            weight *= self.decay;
        }
        colour / total
    }
}

impl SensoryPrimitive for Visual {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "Visual"
    }

    fn feature_count(&self) -> usize {
        4
    }

    fn required_channels(&self) -> Vec<String> {
        vec![self.channel.clone()]
    }

    fn declare(&mut self, ctx: &SimContext) -> Result<Declaration, ConfigError> {
        if self.grid.contains(&0) {
            return Err(ConfigError::invalid("sprimitive.grid", "cells must be > 0"));
        }
        self.workspace = Some(ctx.workspace);
        Ok(Declaration::new(vec![Bound::UNIT; 4]))
    }

    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError> {
        let ws = self.workspace.as_ref().ok_or_else(|| undeclared(self))?;
        let unit: Vec<Vector2<f64>> = readings
            .points(&self.channel)?
            .iter()
            .map(|p| ws.normalize(p))
            .collect();
        if unit.is_empty() {
            return Ok(FeatureVector::zeros(4));
        }
        let rgb = self.blend(&unit);
        let clamp = |v: f64| v.clamp(0.0, 1.0);
        Ok(FeatureVector::new(vec![
            self.coverage(&unit),
            clamp(rgb.x),
            clamp(rgb.y),
            clamp(rgb.z),
        ]))
    }
}
