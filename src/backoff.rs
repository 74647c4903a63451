//! Reconnect backoff policy.
//!
//! Delays grow geometrically from `min` by `factor` per failed attempt and
//! are capped at `max`. Jitter adds a random fraction of the delay on top,
//! never exceeding `max`. A success resets the sequence.
//!
//! ```text
//! attempt:   1     2     3      4      ...  N
//! delay:     min   min*f min*f² min*f³ ...  min(min*f^(N-1), max)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

use crate::config::Config;

// ============================================================================
// Backoff
// ============================================================================

/// Jittered exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    /// Creates a backoff policy.
    ///
    /// Values are clamped into a usable range: `max >= min`, `factor >= 1`,
    /// `jitter` within `[0, 1]`.
    #[must_use]
    pub fn new(min: Duration, max: Duration, factor: f64, jitter: f64) -> Self {
        Self {
            min,
            max: max.max(min),
            factor: if factor.is_finite() { factor.max(1.0) } else { 1.0 },
            jitter: if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 },
            attempt: 0,
        }
    }

    /// Creates a backoff policy from the reconnect settings of `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.min_reconnect_delay,
            config.max_reconnect_delay,
            config.reconnect_factor,
            config.reconnect_jitter,
        )
    }

    /// Adopts the settings of `config`, keeping the current attempt count.
    pub fn reconfigure(&mut self, config: &Config) {
        let attempt = self.attempt;
        *self = Self::from_config(config);
        self.attempt = attempt;
    }

    /// Number of delays handed out since the last reset.
    #[inline]
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the un-jittered delay for a zero-based attempt index.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let min = self.min.as_secs_f64();
        let max = self.max.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = (min * self.factor.powi(exponent)).min(max);
        Duration::try_from_secs_f64(delay).unwrap_or(self.max)
    }

    /// Returns the next delay and advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        if self.jitter == 0.0 {
            return base;
        }

        let spread = rand::thread_rng().gen_range(0.0..=self.jitter);
        Duration::try_from_secs_f64(base.as_secs_f64() * spread)
            .ok()
            .and_then(|extra| base.checked_add(extra))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Restarts the sequence from `min`.
    #[inline]
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
