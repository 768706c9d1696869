//! Deterministic random number generation.
//!
//! Uses a seeded PRNG (Xoshiro256**) so a failing property run can be
//! replayed from its seed.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

/// Deterministic random number generator.
///
/// Given the same seed, always produces the same sequence.
///
/// # Example
///
/// ```rust
/// use aoc_sim::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let a: u64 = rng.gen();
///
/// let mut rng2 = DeterministicRng::new(12345);
/// assert_eq!(rng2.gen::<u64>(), a);
/// ```
pub struct DeterministicRng {
    seed: u64,
    rng: Xoshiro256StarStar,
}

impl DeterministicRng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        debug_assert!(seed != 0, "Seed should not be zero for better randomness");

        Self {
            seed,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn gen<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.rng.gen()
    }

    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.rng.gen_range(range)
    }

    /// Generate a boolean with the given probability of true.
    pub fn gen_bool(&mut self, probability: f64) -> bool {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "Probability must be in [0.0, 1.0]"
        );
        self.rng.gen_bool(probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let mut rng1 = DeterministicRng::new(42);
        let mut rng2 = DeterministicRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.gen::<u64>(), rng2.gen::<u64>());
        }
    }

    #[test]
    fn test_different_seeds() {
        let mut rng1 = DeterministicRng::new(42);
        let mut rng2 = DeterministicRng::new(43);

        let seq1: Vec<u64> = (0..10).map(|_| rng1.gen()).collect();
        let seq2: Vec<u64> = (0..10).map(|_| rng2.gen()).collect();
        assert_ne!(seq1, seq2);
    }
}
