use std::time::Duration;

use rand::Rng;

/// Exponential backoff with additive jitter, driven by a caller-owned RNG.
#[derive(Debug, Clone, Copy)]
pub struct RetryBackoff {
    base: Duration,
    jitter: Duration,
}

impl RetryBackoff {
    pub const fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// Delay after the `attempt`-th failure (1-based): `base * 2^(attempt-1)` plus jitter.
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.base.saturating_mul(factor) + jitter(rng, self.jitter)
    }
}

/// Uniform random duration in `[0, max]`.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    max.mul_f64(rng.random::<f64>())
}
