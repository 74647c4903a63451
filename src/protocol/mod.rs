//! WebSocket message model.
//!
//! This module defines the frames that flow between the client core and a
//! [`Transport`](crate::transport::Transport).
//!
//! # Frame Kinds
//!
//! | Kind | Direction | Handled by |
//! |------|-----------|------------|
//! | `Text` | both | reader / writer |
//! | `Binary` | both | reader / writer |
//! | `Ping` | both | keepalive (out), control bridge (in) |
//! | `Pong` | in | control bridge |
//! | `Close` | both | close path (out), control bridge (in) |

// ============================================================================
// Submodules
// ============================================================================

/// Message, kind and close frame types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{CLOSE_NO_STATUS, CLOSE_NORMAL, CloseFrame, Message, MessageKind};
