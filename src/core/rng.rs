//! Seedable pseudo-random generator shared by all transform units.
//!
//! The generator is an explicit handle threaded by `&mut` through every pass
//! application rather than ambient global state, so tests can inject a fixed
//! stream. All randomized decisions across all units draw from one handle in
//! strict call order, which makes a run byte-reproducible for a fixed seed.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seed sentinel: this value requests entropy self-seeding instead of a
/// deterministic stream.
pub const DEFAULT_SEED: u64 = 0x1337;

/// SplitMix64 generator.
#[derive(Debug, Clone)]
pub struct ObfRng {
    state: u64,
}

impl ObfRng {
    /// Deterministic stream from an explicit seed.
    pub fn seeded(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Self-seeds from system entropy.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let pid = u64::from(std::process::id());
        Self::seeded(nanos ^ pid.rotate_left(32) ^ 0x9e37_79b9_7f4a_7c15)
    }

    /// Honors the [`DEFAULT_SEED`] sentinel: sentinel means entropy,
    /// anything else is deterministic.
    pub fn from_seed_option(seed: u64) -> Self {
        if seed == DEFAULT_SEED {
            Self::from_entropy()
        } else {
            Self::seeded(seed)
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform-ish value in `[0, n)`. `n` must be non-zero.
    pub fn gen_range(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        (self.next_u64() % n as u64) as usize
    }

    pub fn gen_bool(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = ObfRng::seeded(42);
        let mut b = ObfRng::seeded(42);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = ObfRng::seeded(1);
        let mut b = ObfRng::seeded(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn sentinel_takes_entropy_path() {
        // Cannot assert the stream, only that construction works and values
        // come out.
        let mut rng = ObfRng::from_seed_option(DEFAULT_SEED);
        let _ = rng.next_u64();
    }

    #[test]
    fn non_sentinel_is_deterministic() {
        let mut a = ObfRng::from_seed_option(7);
        let mut b = ObfRng::from_seed_option(7);
        assert_eq!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn gen_range_stays_in_bounds() {
        let mut rng = ObfRng::seeded(9);
        for _ in 0..1000 {
            assert!(rng.gen_range(5) < 5);
        }
    }
}
