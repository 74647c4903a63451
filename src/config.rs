//! Client configuration.
//!
//! Provides the tunables for write deadlines, inbound size limits, reconnect
//! backoff, queue capacity and keepalive.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use resocket::Config;
//!
//! let config = Config::new()
//!     .with_queue_capacity(1024)
//!     .with_keepalive_interval(Duration::from_secs(30))
//!     .with_reconnect_delays(Duration::from_millis(500), Duration::from_secs(10));
//!
//! assert!(config.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default write deadline.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum inbound message size (10 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Default first reconnect delay.
pub const DEFAULT_MIN_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Default reconnect delay ceiling.
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Default backoff growth factor.
pub const DEFAULT_RECONNECT_FACTOR: f64 = 1.5;

/// Default jitter ratio added on top of each backoff delay.
pub const DEFAULT_RECONNECT_JITTER: f64 = 0.1;

/// Default outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default keepalive ping interval.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(300);

// ============================================================================
// Config
// ============================================================================

/// Connection manager configuration.
///
/// A snapshot is taken when a connection cycle starts; changing the client's
/// config only affects later cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deadline for a single outbound write.
    pub write_timeout: Duration,

    /// Largest inbound message accepted by the transport, in bytes.
    pub max_message_size: usize,

    /// Delay before the first retry after a failed dial.
    pub min_reconnect_delay: Duration,

    /// Upper bound for any retry delay.
    pub max_reconnect_delay: Duration,

    /// Multiplier applied to the delay after every failed attempt.
    pub reconnect_factor: f64,

    /// Fraction of the delay added as random jitter, in `[0, 1]`.
    pub reconnect_jitter: f64,

    /// Capacity of the outbound queue.
    pub queue_capacity: usize,

    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,

    /// Redial automatically after the connection is lost.
    pub enable_reconnect: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl Config {
    /// Creates a config with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            min_reconnect_delay: DEFAULT_MIN_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            reconnect_factor: DEFAULT_RECONNECT_FACTOR,
            reconnect_jitter: DEFAULT_RECONNECT_JITTER,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            enable_reconnect: true,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl Config {
    /// Sets the write deadline.
    #[inline]
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the maximum inbound message size in bytes.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Sets the minimum and maximum reconnect delays.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_reconnect_delay = min;
        self.max_reconnect_delay = max;
        self
    }

    /// Sets the backoff growth factor.
    #[inline]
    #[must_use]
    pub fn with_reconnect_factor(mut self, factor: f64) -> Self {
        self.reconnect_factor = factor;
        self
    }

    /// Sets the jitter ratio. `0.0` disables jitter.
    #[inline]
    #[must_use]
    pub fn with_reconnect_jitter(mut self, jitter: f64) -> Self {
        self.reconnect_jitter = jitter;
        self
    }

    /// Sets the outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the keepalive interval.
    #[inline]
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Enables or disables automatic reconnection.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.enable_reconnect = enabled;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.write_timeout.is_zero() {
            return Err(Error::config("write_timeout must be > 0"));
        }
        if self.max_message_size == 0 {
            return Err(Error::config("max_message_size must be > 0"));
        }
        if self.min_reconnect_delay.is_zero() {
            return Err(Error::config("min_reconnect_delay must be > 0"));
        }
        if self.max_reconnect_delay < self.min_reconnect_delay {
            return Err(Error::config(
                "max_reconnect_delay must be >= min_reconnect_delay",
            ));
        }
        if !self.reconnect_factor.is_finite() || self.reconnect_factor < 1.0 {
            return Err(Error::config("reconnect_factor must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            return Err(Error::config("reconnect_jitter must be between 0.0 and 1.0"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be > 0"));
        }
        if self.keepalive_interval.is_zero() {
            return Err(Error::config("keepalive_interval must be > 0"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
