//! Coin-face entropy
//!
//! Two strategies share one entry point: with no motion sample every face is
//! an independent fair draw; with a sample the three faces are scrambled out
//! of a single seed taken from the acceleration.
//!
//! The motion scrambler is **not** a cryptographic generator. It multiplies
//! one seed by three primes and keeps the fractional part, which is cheap and
//! decorrelates the coins well enough for entertainment, but anyone who can
//! choose the acceleration can choose the outcome.

use super::coin::CoinFace;
use crate::motion::MotionSample;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One prime per coin; distinct so a single seed yields three unrelated bits
pub const COIN_PRIMES: [f64; 3] = [7919.0, 7867.0, 7823.0];

/// Source of the three coin faces for one line
pub trait EntropySource: Send {
    /// Draw three faces. Never fails: degenerate input falls back to
    /// uniform randomness.
    fn draw_faces(&mut self, sample: Option<&MotionSample>) -> [CoinFace; 3];
}

/// Production entropy: fair coins, or motion-seeded coins when a sample is
/// available
pub struct MotionEntropy<R = StdRng> {
    rng: R,
}

impl MotionEntropy<StdRng> {
    /// Seeded from the operating system
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl<R: Rng> MotionEntropy<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> EntropySource for MotionEntropy<R> {
    fn draw_faces(&mut self, sample: Option<&MotionSample>) -> [CoinFace; 3] {
        match sample {
            None => std::array::from_fn(|_| CoinFace::from_heads(self.rng.gen_bool(0.5))),
            Some(sample) => {
                let seed = motion_seed(sample).unwrap_or_else(|| self.rng.gen::<f64>());
                scramble(seed)
            }
        }
    }
}

/// `|x + y + z|`, or `None` when that is zero or not a finite number
pub fn motion_seed(sample: &MotionSample) -> Option<f64> {
    let seed = (sample.x + sample.y + sample.z).abs();
    if !seed.is_finite() || seed == 0.0 {
        None
    } else {
        Some(seed)
    }
}

/// Derive three faces from one seed: face *i* is heads iff
/// `frac(seed * COIN_PRIMES[i]) > 0.5`
pub fn scramble(seed: f64) -> [CoinFace; 3] {
    COIN_PRIMES.map(|prime| CoinFace::from_heads((seed * prime).fract() > 0.5))
}
