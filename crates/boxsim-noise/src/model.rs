//! Scalar noise models.
//!
//! [`NoiseModel`] is a plain enum dispatched with `match`. Constructors
//! validate their parameters so sampling never fails.

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform as UniformDist};
use thiserror::Error;

// ---------------------------------------------------------------------------
// NoiseError
// ---------------------------------------------------------------------------

/// Validation errors for noise model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum NoiseError {
    #[error("std_dev must be finite and >= 0, got {value}")]
    InvalidStdDev { value: f64 },

    #[error("range must satisfy low < high with finite bounds, got [{low}, {high})")]
    InvalidRange { low: f64, high: f64 },

    #[error("noise level must be finite and >= 0, got {level}")]
    InvalidLevel { level: f64 },
}

// ---------------------------------------------------------------------------
// NoiseModel
// ---------------------------------------------------------------------------

/// Scalar additive noise.
#[derive(Clone, Debug, PartialEq)]
pub enum NoiseModel {
    /// Additive Gaussian: `N(mean, std²)`.
    Gaussian { mean: f64, std: f64 },
    /// Uniform random in `[low, high)`.
    Uniform { low: f64, high: f64 },
}

impl NoiseModel {
    /// Zero noise.
    pub const NONE: Self = Self::Gaussian {
        mean: 0.0,
        std: 0.0,
    };

    /// # Errors
    ///
    /// Returns [`NoiseError::InvalidStdDev`] if `std` is negative, NaN, or
    /// infinite, or if `mean` is not finite.
    pub fn gaussian(mean: f64, std: f64) -> Result<Self, NoiseError> {
        if !std.is_finite() || std < 0.0 {
            return Err(NoiseError::InvalidStdDev { value: std });
        }
        if !mean.is_finite() {
            return Err(NoiseError::InvalidStdDev { value: mean });
        }
        Ok(Self::Gaussian { mean, std })
    }

    pub fn gaussian_zero_mean(std: f64) -> Result<Self, NoiseError> {
        Self::gaussian(0.0, std)
    }

    /// # Errors
    ///
    /// Returns [`NoiseError::InvalidRange`] if `low >= high` or either bound
    /// is not finite.
    pub fn uniform(low: f64, high: f64) -> Result<Self, NoiseError> {
        if !low.is_finite() || !high.is_finite() || low >= high {
            return Err(NoiseError::InvalidRange { low, high });
        }
        Ok(Self::Uniform { low, high })
    }

    /// Symmetric uniform noise `[-half_range, half_range)`. A zero half range
    /// yields [`NoiseModel::NONE`].
    pub fn uniform_symmetric(half_range: f64) -> Result<Self, NoiseError> {
        if half_range == 0.0 {
            return Ok(Self::NONE);
        }
        Self::uniform(-half_range, half_range)
    }

    /// Sample a single noise value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Gaussian { mean, std } => {
                if std == 0.0 {
                    return mean;
                }
                // Parameters were checked on construction.
                Normal::new(mean, std).map_or(mean, |dist| dist.sample(rng))
            }
            Self::Uniform { low, high } => UniformDist::new(low, high).sample(rng),
        }
    }

    /// `value + sample()`.
    pub fn apply<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        value + self.sample(rng)
    }

    pub fn is_zero(&self) -> bool {
        matches!(*self, Self::Gaussian { mean, std } if mean == 0.0 && std == 0.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
