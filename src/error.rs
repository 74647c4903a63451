//! Error types for resocket.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use resocket::{Client, Error, Result};
//!
//! fn publish(client: &Client, payload: &str) -> Result<()> {
//!     match client.send_text(payload) {
//!         Err(Error::BufferFull { .. }) => Ok(()), // shed load
//!         other => other,
//!     }
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Surfaced via |
//! |----------|----------|--------------|
//! | Caller misuse | [`Error::ConnectionClosed`], [`Error::BufferFull`] | return value |
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] | return value / connect-error |
//! | Dial | [`Error::Connection`], [`Error::WebSocket`], [`Error::Io`] | connect-error callback |
//! | Read | [`Error::WebSocket`], [`Error::ConnectionClosed`] | disconnected callback |
//! | Write | [`Error::Timeout`], [`Error::WebSocket`] | send-error callback |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a [`Config`](crate::Config) fails validation.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The endpoint URL could not be parsed.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Parser error message.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport-level connection failure.
    ///
    /// Used by transports for failures that are not WebSocket protocol
    /// errors (handshake rejected, socket reset, etc.).
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Operation attempted while not connected.
    ///
    /// Also returned by a transport whose stream has ended.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The outbound queue is saturated and the message was dropped.
    #[error("Message buffer is full (capacity {capacity})")]
    BufferFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Operation timeout.
    ///
    /// Returned when a write misses its deadline.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a buffer full error.
    #[inline]
    pub fn buffer_full(capacity: usize) -> Self {
        Self::BufferFull { capacity }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a timeout error from the waited duration.
    ///
    /// Milliseconds saturate at `u64::MAX`.
    #[inline]
    pub fn timeout_after(operation: impl Into<String>, waited: Duration) -> Self {
        Self::timeout(
            operation,
            u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
        )
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the message was rejected by queue backpressure.
    #[inline]
    #[must_use]
    pub fn is_buffer_full(&self) -> bool {
        matches!(self, Self::BufferFull { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_) | Self::Io(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry without caller changes.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::BufferFull { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
