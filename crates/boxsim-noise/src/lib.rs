//! Order perturbation for boxsim trials.
//!
//! Orders handed to a simulation can be perturbed before they reach the motor
//! primitive. Each order dimension gets its own scalar [`NoiseModel`], scaled
//! by the width of that dimension's bound, and the perturbed value is clamped
//! back into the bound.
//!
//! All sampling takes an explicit RNG so trials are reproducible from a seed.
//!
//! ```
//! use boxsim_core::types::Bound;
//! use boxsim_noise::prelude::*;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let bounds = [Bound::new(-2.0, 2.0), Bound::new(0.0, 1.0)];
//! let mut noise = OrderNoise::gaussian(0.05, &bounds).unwrap();
//! let mut rng = ChaCha8Rng::seed_from_u64(7);
//! let order = noise.perturb(&[0.5, 0.5], &mut rng);
//! assert!(bounds[1].contains(order[1]));
//! ```

pub mod model;
pub mod vector;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::model::{NoiseError, NoiseModel};
    pub use crate::vector::{OrderNoise, VectorNoiseModel};
}
