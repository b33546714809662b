//! Deterministic RNG for reproducible generation.
//!
//! Uses a simple xorshift64 algorithm for fast, reproducible random numbers.
//! The session reseeds to [`FIXED_SEED`] at every reset when running in
//! deterministic mode, which is what makes independent turns reproducible.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

/// Seed used whenever deterministic generation is requested.
pub const FIXED_SEED: u64 = 42;

/// Seeded xorshift64 RNG. Mutated on each call.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        // Avoid zero state which would produce all zeros
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Seed from OS-provided entropy (non-deterministic mode).
    pub fn from_entropy() -> Self {
        Self::new(RandomState::new().hash_one(0u64))
    }

    /// Reset the generator to a known seed.
    pub fn reseed(&mut self, seed: u64) {
        self.state = if seed == 0 { 1 } else { seed };
    }

    /// Generate next random float in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        // xorshift64
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform index in [0, n). `n` must be nonzero.
    pub fn next_index(&mut self, n: usize) -> usize {
        ((self.next_f32() * n as f32) as usize).min(n - 1)
    }
}
