// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Thermodiff Seeded Noise Source
// ─────────────────────────────────────────────────────────────────────
//! Every random draw in the kernel goes through a [`NoiseSource`]. With
//! a seed, trajectories replay bit-for-bit; without one the generator
//! is seeded from OS entropy.

use ndarray::{ArrayD, IxDyn};
use ndarray_rand::RandomExt;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::StandardNormal;

use thermodiff_types::{ThermodiffError, ThermodiffResult};

/// ChaCha20-backed generator for Gaussian fields and categorical picks.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: ChaCha20Rng,
}

impl NoiseSource {
    /// Seeded when `seed` is given, OS entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::seeded(s),
            None => Self {
                rng: ChaCha20Rng::from_entropy(),
            },
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Independent child stream, derived deterministically from this one.
    pub fn fork(&mut self) -> Self {
        Self::seeded(self.rng.next_u64())
    }

    /// ε ~ N(0, I) with the given shape.
    pub fn standard_normal(&mut self, shape: &[usize]) -> ArrayD<f64> {
        ArrayD::random_using(IxDyn(shape), StandardNormal, &mut self.rng)
    }

    /// ε ~ N(0, I) shaped like `like`.
    pub fn standard_normal_like(&mut self, like: &ArrayD<f64>) -> ArrayD<f64> {
        self.standard_normal(like.shape())
    }

    /// One sample from N(0, 1).
    pub fn gaussian(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }

    /// Uniform sample in [0, 1).
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Draw an index with probability proportional to `weights`.
    pub fn categorical(&mut self, weights: &[f64]) -> ThermodiffResult<usize> {
        let dist = WeightedIndex::new(weights).map_err(|e| {
            ThermodiffError::Numerical(format!("invalid categorical weights: {e}"))
        })?;
        Ok(dist.sample(&mut self.rng))
    }
}

impl Default for NoiseSource {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_streams_repeat() {
        let mut a = NoiseSource::seeded(42);
        let mut b = NoiseSource::seeded(42);
        let xa = a.standard_normal(&[3, 4]);
        let xb = b.standard_normal(&[3, 4]);
        assert_eq!(xa, xb);
        assert_eq!(a.uniform(), b.uniform());
    }

    #[test]
    fn test_different_seeds_differ() {
        let xa = NoiseSource::seeded(1).standard_normal(&[8, 8]);
        let xb = NoiseSource::seeded(2).standard_normal(&[8, 8]);
        assert_ne!(xa, xb);
    }

    #[test]
    fn test_standard_normal_moments() {
        let mut src = NoiseSource::seeded(7);
        let x = src.standard_normal(&[200, 200]);
        let n = x.len() as f64;
        let mean = x.sum() / n;
        let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.02, "mean = {mean}");
        assert!((var - 1.0).abs() < 0.03, "var = {var}");
    }

    #[test]
    fn test_categorical_respects_zero_weight() {
        let mut src = NoiseSource::seeded(3);
        for _ in 0..200 {
            let i = src.categorical(&[0.0, 1.0, 0.0]).unwrap();
            assert_eq!(i, 1);
        }
    }

    #[test]
    fn test_categorical_rejects_all_zero() {
        let mut src = NoiseSource::seeded(3);
        assert!(src.categorical(&[0.0, 0.0]).is_err());
        assert!(src.categorical(&[]).is_err());
    }

    #[test]
    fn test_categorical_frequencies() {
        let mut src = NoiseSource::seeded(11);
        let mut counts = [0usize; 2];
        for _ in 0..10_000 {
            counts[src.categorical(&[0.25, 0.75]).unwrap()] += 1;
        }
        let frac = counts[1] as f64 / 10_000.0;
        assert!((frac - 0.75).abs() < 0.03, "frac = {frac}");
    }

    #[test]
    fn test_fork_is_deterministic() {
        let mut a = NoiseSource::seeded(5);
        let mut b = NoiseSource::seeded(5);
        let xa = a.fork().standard_normal(&[2, 2]);
        let xb = b.fork().standard_normal(&[2, 2]);
        assert_eq!(xa, xb);
    }
}
