//! Core primitives.
//!
//! Seeded randomness for dealing. Given the same seed, every platform
//! produces the same shuffle.

pub mod rng;

pub use rng::{derive_deal_seed, DeterministicRng};
