//! Injectable randomness for template choice, send pacing and sender choice.

use rand::Rng;

pub trait RandomSource: Send {
    /// Uniform index in `0..len`. `len` must be non-zero.
    fn pick(&mut self, len: usize) -> usize;

    /// `true` with probability `percent`/100.
    fn chance(&mut self, percent: u8) -> bool;

    /// Uniform value in `low..=high`.
    fn between(&mut self, low: u64, high: u64) -> u64;
}

/// Production source backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&mut self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }

    fn chance(&mut self, percent: u8) -> bool {
        rand::thread_rng().gen_range(0..100u8) < percent.min(100)
    }

    fn between(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        rand::thread_rng().gen_range(low..=high)
    }
}

/// Deterministic source: always picks `index` (clamped), every chance
/// returns `keep`, ranges return their lower bound.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom {
    pub index: usize,
    pub keep: bool,
}

impl Default for FixedRandom {
    fn default() -> Self {
        Self {
            index: 0,
            keep: true,
        }
    }
}

impl RandomSource for FixedRandom {
    fn pick(&mut self, len: usize) -> usize {
        self.index.min(len.saturating_sub(1))
    }

    fn chance(&mut self, _percent: u8) -> bool {
        self.keep
    }

    fn between(&mut self, low: u64, _high: u64) -> u64 {
        low
    }
}
