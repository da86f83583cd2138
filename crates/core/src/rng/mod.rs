//! Index-addressed pseudo-random numbers.
//!
//! Every value is a pure function of its seed index, so any frame can be
//! regenerated in isolation without replaying earlier draws.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::StarfieldSeeding;

const SEED_SCALE: u64 = 10_000_000_000;
const MULBERRY_INCREMENT: u32 = 0x6d2b_79f5;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Returns a value in `[0, 1)` derived solely from `seed`.
///
/// The seed is spread by a factor of `10^10` and truncated to 32 bits before a
/// single mulberry32 round, which matches the reference values for every
/// index below ~900 000.
pub fn sample(seed: u32) -> f64 {
    let spread = u64::from(seed).wrapping_mul(SEED_SCALE) as u32;
    let mut t = spread.wrapping_add(MULBERRY_INCREMENT);
    t = (t ^ (t >> 15)).wrapping_mul(t | 1);
    t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
    f64::from(t ^ (t >> 14)) / TWO_POW_32
}

/// Sequential uniform source used where index determinism is not required.
pub enum FreeSource {
    Unseeded(rand::rngs::ThreadRng),
    Seeded(StdRng),
}

impl FreeSource {
    pub fn new(seeding: StarfieldSeeding) -> Self {
        match seeding {
            StarfieldSeeding::Unseeded => Self::Unseeded(rand::thread_rng()),
            StarfieldSeeding::Seeded { seed } => Self::Seeded(StdRng::seed_from_u64(seed)),
        }
    }

    /// Next value in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        match self {
            Self::Unseeded(rng) => rng.gen::<f64>(),
            Self::Seeded(rng) => rng.gen::<f64>(),
        }
    }
}

impl std::fmt::Debug for FreeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unseeded(_) => f.write_str("FreeSource::Unseeded"),
            Self::Seeded(_) => f.write_str("FreeSource::Seeded"),
        }
    }
}
