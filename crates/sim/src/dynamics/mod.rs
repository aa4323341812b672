//! Per-generation update: propagule dispersal and settlement arbitration.
//!
//! Both phases run over disjoint partitions produced by
//! [`parallel::partition`]; each partition owns one mutable chunk of the
//! output buffer and one private random stream.

pub mod dispersal;
pub mod parallel;
pub mod settlement;

pub use dispersal::project_dispersal;
pub use parallel::{partition, split_ranges_mut, WorkerPool};
pub use settlement::arbitrate_settlement;

use rand::Rng;

/// Round `expected` to an integer whose mean is `expected`.
#[inline]
pub fn stochastic_round<R: Rng + ?Sized>(expected: f64, rng: &mut R) -> u64 {
    if expected <= 0.0 || !expected.is_finite() {
        return 0;
    }
    (expected + rng.random::<f64>()).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_stochastic_round_mean() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let trials = 100_000;
        let sum: u64 = (0..trials).map(|_| stochastic_round(2.3, &mut rng)).sum();
        let mean = sum as f64 / trials as f64;
        assert!((mean - 2.3).abs() < 0.01, "mean {mean}");
    }

    #[test]
    fn test_stochastic_round_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        for _ in 0..1000 {
            let n = stochastic_round(4.5, &mut rng);
            assert!(n == 4 || n == 5);
        }
        assert_eq!(stochastic_round(0.0, &mut rng), 0);
        assert_eq!(stochastic_round(f64::NAN, &mut rng), 0);
        assert_eq!(stochastic_round(3.0, &mut rng), 3);
    }
}
