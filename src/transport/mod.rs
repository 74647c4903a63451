//! Transport abstraction.
//!
//! The client core never touches sockets directly. It dials through a
//! [`Dialer`] and talks to the resulting [`Transport`] handle, which owns the
//! handshake, framing, control-frame replies and TLS.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   dial(DialRequest)    ┌──────────────┐
//! │ Reconnector  │───────────────────────►│    Dialer    │
//! └──────┬───────┘                        └──────┬───────┘
//!        │ install cycle                         │ Dialed
//!        ▼                                       ▼
//! ┌──────────────┐  read_message()        ┌──────────────┐
//! │   Reader     │◄───────────────────────│              │
//! ├──────────────┤  write_message()       │  Transport   │──► ControlHandler
//! │   Writer     │───────────────────────►│              │    (ping/pong/close)
//! └──────────────┘                        └──────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | Default transport over `tokio-tungstenite` |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::Message;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport built on `tokio-tungstenite`.
pub mod websocket;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::{TungsteniteDialer, TungsteniteTransport};

// ============================================================================
// DialRequest
// ============================================================================

/// Everything a [`Dialer`] needs to open one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialRequest {
    /// Endpoint URL (`ws://` or `wss://`).
    pub url: String,
    /// Extra handshake request headers, in insertion order.
    pub headers: Vec<(String, String)>,
    /// Largest inbound message the transport must accept.
    pub max_message_size: usize,
}

// ============================================================================
// Dialed
// ============================================================================

/// A freshly opened transport handle.
pub struct Dialed {
    /// The connected handle.
    pub transport: Arc<dyn Transport>,
    /// HTTP status of the handshake response, when the transport has one.
    pub handshake_status: Option<u16>,
}

impl Dialed {
    /// Wraps a transport with no handshake information.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            handshake_status: None,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Opens transport connections.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Opens a connection described by `request`.
    ///
    /// # Errors
    ///
    /// Any error is treated as a transient dial failure and retried.
    async fn dial(&self, request: &DialRequest) -> Result<Dialed>;
}

/// A connected, message-oriented duplex handle.
///
/// Reads and writes may run concurrently from different tasks; the client
/// guarantees at most one write is in flight at a time.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Reads the next data message.
    ///
    /// Control frames are consumed internally: the installed
    /// [`ControlHandler`] is notified and the transport performs its own
    /// protocol handling (pong reply, close reply).
    ///
    /// # Errors
    ///
    /// Any error means the connection is no longer readable.
    async fn read_message(&self) -> Result<Message>;

    /// Writes one message, failing if it does not complete within `deadline`.
    async fn write_message(&self, message: &Message, deadline: Duration) -> Result<()>;

    /// Installs the observer for inbound control frames.
    fn set_control_handler(&self, handler: Arc<dyn ControlHandler>);

    /// Closes the handle. Calling this more than once is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Observer for inbound control frames.
///
/// Called on the reading task; implementations must not block.
pub trait ControlHandler: Send + Sync + 'static {
    /// A ping arrived.
    fn on_ping(&self, payload: &[u8]);

    /// A pong arrived.
    fn on_pong(&self, payload: &[u8]);

    /// The peer sent a close frame.
    fn on_close(&self, code: u16, reason: &str);
}
