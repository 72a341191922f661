//! Deterministic hasher built on ahash.
//!
//! AHasher with explicit seeds gives deterministic, per-seed-independent
//! hashing. The same primitive serves minimizer selection, the
//! open-addressing tables, the Bloom oracle and the seeded color-slot probes.

use ahash::RandomState;
use std::hash::{BuildHasher, Hasher};

/// A deterministic hasher with a seeded state
#[derive(Clone)]
pub struct DeterministicHasher {
    seed: u64,
    state: RandomState,
}

impl DeterministicHasher {
    /// Create a new deterministic hasher with the given seed
    pub fn new(seed: u64) -> Self {
        let state = RandomState::with_seeds(seed, !seed, seed, !seed);
        Self { seed, state }
    }

    /// Hash a u64 value
    #[inline]
    pub fn hash_u64(&self, value: u64) -> u64 {
        let mut hasher = self.state.build_hasher();
        hasher.write_u64(value);
        hasher.finish()
    }

    /// Hash a u128 value (packed k-mer or minimizer bits)
    #[inline]
    pub fn hash_u128(&self, value: u128) -> u64 {
        let mut hasher = self.state.build_hasher();
        hasher.write_u128(value);
        hasher.finish()
    }

    /// Get the seed value
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_hashing() {
        let hasher1 = DeterministicHasher::new(42);
        let hasher2 = DeterministicHasher::new(42);
        let hasher3 = DeterministicHasher::new(43);

        let value = 0x123456789abcdef0u64;

        // Same seed, same hash
        assert_eq!(hasher1.hash_u64(value), hasher2.hash_u64(value));

        // Different seed, different hash
        assert_ne!(hasher1.hash_u64(value), hasher3.hash_u64(value));
    }

    #[test]
    fn test_u128_hashing_is_deterministic() {
        let hasher1 = DeterministicHasher::new(7);
        let hasher2 = DeterministicHasher::new(7);
        let value = 0x0123_4567_89ab_cdef_0123_4567_89ab_cdefu128;
        assert_eq!(hasher1.hash_u128(value), hasher2.hash_u128(value));
        assert_ne!(hasher1.hash_u128(value), hasher1.hash_u128(value + 1));
    }
}
