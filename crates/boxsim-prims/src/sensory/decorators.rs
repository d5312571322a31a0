//! Primitives wrapping other primitives.

use std::cmp::Ordering;

use boxsim_core::error::{ConfigError, SensorError};
use boxsim_core::types::{Bound, Declaration, FeatureVector, SensorReadings, SimContext};

use super::{SensoryPrimitive, undeclared};

// ---------------------------------------------------------------------------
// UniformizeSensory
// ---------------------------------------------------------------------------

/// Rescales every feature of the inner primitive from its bound to `[0, 1]`.
pub struct UniformizeSensory {
    inner: Box<dyn SensoryPrimitive>,
    inner_bounds: Vec<Bound>,
}

impl UniformizeSensory {
    pub fn new(inner: Box<dyn SensoryPrimitive>) -> Self {
        Self {
            inner,
            inner_bounds: Vec::new(),
        }
    }

    /// Bounds of the wrapped primitive, empty before declaration.
    pub fn inner_bounds(&self) -> &[Bound] {
        &self.inner_bounds
    }

    /// Map uniformized features back to the inner primitive's scale.
    pub fn restore(&self, unit: &[f64]) -> Vec<f64> {
        unit.iter()
            .zip(&self.inner_bounds)
            .map(|(u, b)| b.from_unit(*u))
            .collect()
    }
}

impl SensoryPrimitive for UniformizeSensory {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn feature_count(&self) -> usize {
        self.inner.feature_count()
    }

    fn required_channels(&self) -> Vec<String> {
        self.inner.required_channels()
    }

    /// # Errors
    ///
    /// [`ConfigError::DegenerateBound`] if any inner bound has `max <= min`.
    fn declare(&mut self, ctx: &SimContext) -> Result<Declaration, ConfigError> {
        let inner = self.inner.declare(ctx)?;
        if let Some((index, b)) = inner
            .bounds
            .iter()
            .enumerate()
            .find(|(_, b)| b.max.partial_cmp(&b.min) != Some(Ordering::Greater))
        {
            return Err(ConfigError::DegenerateBound {
                index,
                min: b.min,
                max: b.max,
            });
        }
        let n = inner.bounds.len();
        self.inner_bounds = inner.bounds;
        Ok(Declaration {
            bounds: vec![Bound::UNIT; n],
            fixed: inner.fixed,
        })
    }

    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError> {
        if self.inner_bounds.is_empty() {
            return Err(undeclared(self));
        }
        let mut features = self.inner.process_sensors(readings)?;
        for (v, b) in features.as_mut_slice().iter_mut().zip(&self.inner_bounds) {
            *v = b.to_unit(*v);
        }
        Ok(features)
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Selects and reorders features of the inner primitive.
///
/// Each selected feature may carry a factor pair `(f_min, f_max)` that
/// rebuilds its bound from the inner one:
///
/// ```text
/// new_min = max - f_min * (max - min)
/// new_max = min + f_max * (max - min)
/// ```
///
/// `(1, 1)` keeps the bound; smaller factors shrink it, larger ones widen it.
pub struct Filter {
    inner: Box<dyn SensoryPrimitive>,
    features: Vec<usize>,
    factors: Option<Vec<[f64; 2]>>,
}

impl Filter {
    /// # Errors
    ///
    /// [`ConfigError::FeatureIndexOutOfRange`] for an index past the inner
    /// feature count, [`ConfigError::InvalidValue`] if factors are given for a
    /// different number of features.
    pub fn new(
        inner: Box<dyn SensoryPrimitive>,
        features: Vec<usize>,
        factors: Option<Vec<[f64; 2]>>,
    ) -> Result<Self, ConfigError> {
        let len = inner.feature_count();
        if let Some(&index) = features.iter().find(|i| **i >= len) {
            return Err(ConfigError::FeatureIndexOutOfRange { index, len });
        }
        if let Some(f) = &factors
            && f.len() != features.len()
        {
            return Err(ConfigError::invalid(
                "sprimitive.filter.factors",
                format!("{} factors for {} features", f.len(), features.len()),
            ));
        }
        Ok(Self {
            inner,
            features,
            factors,
        })
    }

    pub fn features(&self) -> &[usize] {
        &self.features
    }
}

impl SensoryPrimitive for Filter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn required_channels(&self) -> Vec<String> {
        self.inner.required_channels()
    }

    /// # Errors
    ///
    /// [`ConfigError::InvertedBound`] if a factor pair yields `new_min > new_max`.
    fn declare(&mut self, ctx: &SimContext) -> Result<Declaration, ConfigError> {
        let inner = self.inner.declare(ctx)?;
        let mut bounds: Vec<Bound> = self.features.iter().map(|i| inner.bounds[*i]).collect();
        let fixed = self.features.iter().map(|i| inner.fixed[*i]).collect();

        if let Some(factors) = &self.factors {
            for (index, (b, [f_min, f_max])) in bounds.iter_mut().zip(factors).enumerate() {
                let width = b.width();
                let min = b.max - f_min * width;
                let max = b.min + f_max * width;
                *b = Bound::checked(index, min, max)?;
            }
        }
        Ok(Declaration { bounds, fixed })
    }

    fn process_sensors(&self, readings: &SensorReadings) -> Result<FeatureVector, SensorError> {
        let all = self.inner.process_sensors(readings)?;
        Ok(FeatureVector::new(
            self.features.iter().map(|i| all[*i]).collect(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
