//! Deterministic random number generation for synthetic snapshots.
//!
//! RULE: synthetic data never touches a platform RNG. Every draw flows
//! through a `CohortRng` seeded from the caller's seed, so the same seed
//! always yields the same customer base.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct CohortRng {
    inner: Pcg64Mcg,
}

impl CohortRng {
    /// The stream index keeps independent draws (ids, dates, spend)
    /// reproducible in isolation.
    pub fn new(seed: u64, stream: u64) -> Self {
        let derived_seed = seed ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self { inner: Pcg64Mcg::seed_from_u64(derived_seed) }
    }

    /// Uniform in `[0, n)`. Panics when `n` is zero.
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        self.inner.gen_range(0..n)
    }

    pub fn chance(&mut self, p: f64) -> bool {
        self.inner.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Inverse-transform Pareto draw, never below `x_min`.
    pub fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u: f64 = self.inner.gen_range(f64::MIN_POSITIVE..=1.0);
        x_min / u.powf(1.0 / alpha)
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.next_u64_below(items.len() as u64) as usize]
    }
}
