//! Deterministic random number generation.
//!
//! RULE: No pipeline stage may call any platform RNG.
//! All randomness flows through StageRng instances derived from the
//! single seed in EngineConfig. A fresh RngBank is built per request.
//!
//! Each stage gets its own stream, seeded from (seed XOR slot), so
//! adding a stage never changes the draws of existing ones.

use rand::{seq::SliceRandom, Rng, RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single pipeline stage.
pub struct StageRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StageRng {
    /// The slot index must never change once assigned.
    pub fn new(seed: u64, slot_index: u64) -> Self {
        let derived_seed = seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Roll an index in [0, n).
    pub fn next_index(&mut self, n: usize) -> usize {
        assert!(n > 0, "n must be > 0");
        self.inner.gen_range(0..n)
    }

    /// Uniform shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }

    /// Split off an independent child stream, e.g. one per forest tree.
    pub fn fork(&mut self, name: &'static str) -> StageRng {
        let seed = self.next_u64();
        StageRng::new(seed, 0).with_name(name)
    }
}

/// All stage RNGs for a single request, indexed by stable slot.
pub struct RngBank {
    seed: u64,
}

impl RngBank {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn for_stage(&self, slot: StageSlot) -> StageRng {
        StageRng::new(self.seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stage slot assignments.
/// NEVER reorder or remove entries, only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StageSlot {
    Segmenter = 0,
    Split = 1,
    Forest = 2,
}

impl StageSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Segmenter => "segmenter",
            Self::Split => "split",
            Self::Forest => "forest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = RngBank::new(42).for_stage(StageSlot::Forest);
        let mut b = RngBank::new(42).for_stage(StageSlot::Forest);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn slots_are_independent_streams() {
        let bank = RngBank::new(42);
        let mut seg = bank.for_stage(StageSlot::Segmenter);
        let mut split = bank.for_stage(StageSlot::Split);
        assert_ne!(seg.next_u64(), split.next_u64());
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = RngBank::new(7).for_stage(StageSlot::Split);
        let mut items: Vec<usize> = (0..50).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn draws_stay_in_range() {
        let mut rng = RngBank::new(3).for_stage(StageSlot::Segmenter);
        for n in [1usize, 2, 3, 17, 1000] {
            for _ in 0..200 {
                assert!(rng.next_index(n) < n);
            }
        }
        for _ in 0..200 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn shuffle_is_reproducible_for_a_seed() {
        let mut a: Vec<usize> = (0..30).collect();
        let mut b = a.clone();
        RngBank::new(11).for_stage(StageSlot::Split).shuffle(&mut a);
        RngBank::new(11).for_stage(StageSlot::Split).shuffle(&mut b);
        assert_eq!(a, b);
        assert_ne!(a, (0..30).collect::<Vec<_>>());
    }
}
