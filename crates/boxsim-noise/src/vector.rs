//! Per-dimension noise over whole orders.

use boxsim_core::config::{NoiseConfig, NoiseKind};
use boxsim_core::types::Bound;
use rand::Rng;

use crate::model::{NoiseError, NoiseModel};

// ---------------------------------------------------------------------------
// VectorNoiseModel trait
// ---------------------------------------------------------------------------

/// Multi-dimensional noise model.
pub trait VectorNoiseModel: Send + Sync {
    /// Sample a noise vector of length [`dim()`](Self::dim).
    fn sample_vec<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64>;

    /// Apply noise to a clean vector element-wise.
    fn apply_vec<R: Rng + ?Sized>(&self, values: &[f64], rng: &mut R) -> Vec<f64> {
        let noise = self.sample_vec(rng);
        values.iter().zip(&noise).map(|(v, n)| v + n).collect()
    }

    fn dim(&self) -> usize;
}

// ---------------------------------------------------------------------------
// OrderNoise
// ---------------------------------------------------------------------------

/// Independent noise per order dimension, clamped into the order bounds.
#[derive(Clone, Debug)]
pub struct OrderNoise {
    models: Vec<NoiseModel>,
    bounds: Vec<Bound>,
}

impl OrderNoise {
    /// Gaussian noise with `std = level × width` per dimension.
    pub fn gaussian(level: f64, bounds: &[Bound]) -> Result<Self, NoiseError> {
        Self::scaled(level, bounds, NoiseModel::gaussian_zero_mean)
    }

    /// Uniform noise in `±level × width` per dimension.
    pub fn uniform(level: f64, bounds: &[Bound]) -> Result<Self, NoiseError> {
        Self::scaled(level, bounds, NoiseModel::uniform_symmetric)
    }

    /// Build from configuration. `None` when the level is zero.
    pub fn from_config(config: &NoiseConfig, bounds: &[Bound]) -> Result<Option<Self>, NoiseError> {
        if !config.is_enabled() {
            return Ok(None);
        }
        let noise = match config.kind {
            NoiseKind::Gaussian => Self::gaussian(config.level, bounds)?,
            NoiseKind::Uniform => Self::uniform(config.level, bounds)?,
        };
        Ok(Some(noise))
    }

    fn scaled(
        level: f64,
        bounds: &[Bound],
        make: fn(f64) -> Result<NoiseModel, NoiseError>,
    ) -> Result<Self, NoiseError> {
        if !level.is_finite() || level < 0.0 {
            return Err(NoiseError::InvalidLevel { level });
        }
        let models = bounds
            .iter()
            .map(|b| make(level * b.width()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            models,
            bounds: bounds.to_vec(),
        })
    }

    pub fn models(&self) -> &[NoiseModel] {
        &self.models
    }

    /// Perturb `order` and clamp each dimension into its bound.
    pub fn perturb<R: Rng + ?Sized>(&self, order: &[f64], rng: &mut R) -> Vec<f64> {
        self.apply_vec(order, rng)
            .into_iter()
            .zip(&self.bounds)
            .map(|(v, b)| b.clamp(v))
            .collect()
    }
}

impl VectorNoiseModel for OrderNoise {
    fn sample_vec<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.models.iter().map(|m| m.sample(rng)).collect()
    }

    fn dim(&self) -> usize {
        self.models.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
