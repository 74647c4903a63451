//! Message frames exchanged with the transport.
//!
//! [`Message`] is both what producers enqueue for the writer and what a
//! [`Transport`](crate::transport::Transport) yields to the reader.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Normal closure (RFC 6455 section 7.4.1).
pub const CLOSE_NORMAL: u16 = 1000;

/// Reported when the peer closed without a status code.
pub const CLOSE_NO_STATUS: u16 = 1005;

// ============================================================================
// MessageKind
// ============================================================================

/// Frame kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// UTF-8 text data frame.
    Text,
    /// Binary data frame.
    Binary,
    /// Ping control frame.
    Ping,
    /// Pong control frame.
    Pong,
    /// Close control frame.
    Close,
}

impl MessageKind {
    /// Returns `true` for ping, pong and close.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Ping | Self::Pong | Self::Close)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

// ============================================================================
// CloseFrame
// ============================================================================

/// Status code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Close status code.
    pub code: u16,
    /// Human-readable reason.
    pub reason: String,
}

impl CloseFrame {
    /// Creates a close frame.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Creates a normal-closure (1000) frame with the given reason.
    #[inline]
    #[must_use]
    pub fn normal(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_NORMAL, reason)
    }
}

// ============================================================================
// Message
// ============================================================================

/// A single WebSocket message.
///
/// Outbound messages are immutable once enqueued and consumed exactly once
/// by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Text payload.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
    /// Ping with application data.
    Ping(Vec<u8>),
    /// Pong with application data.
    Pong(Vec<u8>),
    /// Close, optionally with status.
    Close(Option<CloseFrame>),
}

impl Message {
    /// Returns the frame kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Binary(_) => MessageKind::Binary,
            Self::Ping(_) => MessageKind::Ping,
            Self::Pong(_) => MessageKind::Pong,
            Self::Close(_) => MessageKind::Close,
        }
    }

    /// Returns the payload length in bytes.
    ///
    /// For close frames this is the reason length.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) | Self::Ping(data) | Self::Pong(data) => data.len(),
            Self::Close(frame) => frame.as_ref().map_or(0, |f| f.reason.len()),
        }
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data)
    }
}

// ============================================================================
// Tests
// ============================================================================
