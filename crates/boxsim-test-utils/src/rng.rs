//! Deterministic RNG utilities for reproducible tests.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Create a deterministic `ChaCha8Rng` from a seed.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Deterministic `Vec<f64>` of length `dim` with values in `[0, 1)`.
pub fn deterministic_vec(dim: usize, seed: u64) -> Vec<f64> {
    use rand::Rng;
    let mut rng = seeded_rng(seed);
    (0..dim).map(|_| rng.r#gen::<f64>()).collect()
}
