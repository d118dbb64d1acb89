//! Deterministic Random Number Generator
//!
//! 128-bit xoroshiro-style generator seeded through SplitMix64.
//! Given the same seed, produces the identical sequence on every platform,
//! which lets a seeded server replay the exact same deals.

use sha2::{Sha256, Digest};

/// Deterministic PRNG used for deck shuffles.
///
/// # Example
///
/// ```
/// use memory_match::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a uniformly distributed integer in `[0, bound)`.
    ///
    /// Draws below `2^64 mod bound` are rejected so every residue has the
    /// same number of preimages. Returns 0 when `bound` is 0.
    #[inline]
    pub fn next_below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return r % bound;
            }
        }
    }

    /// Shuffle a slice in place using Fisher-Yates.
    ///
    /// Walks `i` from the last index down to 1 and swaps with a uniform
    /// `j` in `[0, i]`, inclusive.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = self.next_below(i as u64 + 1) as usize;
            slice.swap(i, j);
        }
    }
}

/// SplitMix64 for seed initialization.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive the seed for one deal of a session.
///
/// # Parameters
///
/// - `session_id`: session the deal belongs to
/// - `deal`: per-session deal counter (1 for the first `start-game`)
/// - `entropy`: fresh random bytes, or a fixed seed for reproducible deals
pub fn derive_deal_seed(session_id: &[u8; 16], deal: u64, entropy: &[u8]) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"MEMORY_MATCH_DEAL_V1");
    hasher.update(session_id);
    hasher.update(deal.to_le_bytes());
    hasher.update(entropy);

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(54321);

        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_next_below() {
        let mut rng = DeterministicRng::new(1234);

        for _ in 0..1000 {
            assert!(rng.next_below(12) < 12);
        }

        // Edge cases
        assert_eq!(rng.next_below(0), 0);
        assert_eq!(rng.next_below(1), 0);
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut rng1 = DeterministicRng::new(1111);
        let mut rng2 = DeterministicRng::new(1111);

        let mut arr1 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let mut arr2 = arr1;

        rng1.shuffle(&mut arr1);
        rng2.shuffle(&mut arr2);

        assert_eq!(arr1, arr2);
    }

    #[test]
    fn test_shuffle_handles_tiny_slices() {
        let mut rng = DeterministicRng::new(3);
        let mut empty: [u8; 0] = [];
        rng.shuffle(&mut empty);

        let mut one = [7];
        rng.shuffle(&mut one);
        assert_eq!(one, [7]);
    }

    #[test]
    fn test_shuffle_is_roughly_uniform() {
        // 3! = 6 orderings; each should land near 1/6 of the runs.
        let mut rng = DeterministicRng::new(2024);
        let runs = 60_000;
        let mut counts: BTreeMap<[u8; 3], u32> = BTreeMap::new();

        for _ in 0..runs {
            let mut arr = [0u8, 1, 2];
            rng.shuffle(&mut arr);
            *counts.entry(arr).or_default() += 1;
        }

        assert_eq!(counts.len(), 6);
        let expected = runs / 6;
        for (perm, count) in counts {
            let deviation = (count as i64 - expected as i64).abs();
            assert!(deviation < 600, "ordering {:?} seen {} times", perm, count);
        }
    }

    #[test]
    fn test_derive_deal_seed() {
        let session = [1u8; 16];

        let seed1 = derive_deal_seed(&session, 1, b"entropy");
        let seed2 = derive_deal_seed(&session, 1, b"entropy");
        assert_eq!(seed1, seed2);

        // Each deal of the same session gets its own seed
        assert_ne!(seed1, derive_deal_seed(&session, 2, b"entropy"));
        assert_ne!(seed1, derive_deal_seed(&[2u8; 16], 1, b"entropy"));
    }

    proptest! {
        #[test]
        fn prop_shuffle_is_permutation(seed in any::<u64>()) {
            let mut rng = DeterministicRng::new(seed);
            let mut arr: Vec<u32> = (1..=12).collect();
            rng.shuffle(&mut arr);

            let mut sorted = arr.clone();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (1..=12).collect::<Vec<u32>>());
        }

        #[test]
        fn prop_next_below_in_range(seed in any::<u64>(), bound in 1u64..1000) {
            let mut rng = DeterministicRng::new(seed);
            prop_assert!(rng.next_below(bound) < bound);
        }
    }
}
