//! Auto-reconnecting client.
//!
//! A [`Client`] owns one logical connection to a URL. Each successful dial
//! starts a new connection cycle with its own outbound queue, a reader task
//! and a writer task. When the reader sees the transport fail, the cycle is
//! torn down and, if reconnect is enabled, a fresh cycle is dialed after a
//! backoff delay.
//!
//! # Lifecycle
//!
//! ```text
//!          connect()
//!  Idle ─────────────► Dialing ──success──► Connected
//!   ▲                   ▲   │                  │
//!   │ peer close        │   └─fail: backoff    │ read error
//!   │                   │                      ▼
//!   └───────────────────┴──── reconnect ── Disconnected
//!
//!  close() / written Close / read error without reconnect ──► Terminal
//! ```
//!
//! # Example
//!
//! ```no_run
//! use resocket::{Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::new("wss://echo.example.com/socket");
//!     client.on_text_message_received(|text| println!("<- {text}"));
//!
//!     client.connect().await?;
//!     client.send_text("hello")?;
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use crate::backoff::Backoff;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::{CLOSE_NORMAL, CloseFrame, Message};
use crate::transport::{Dialer, TungsteniteDialer};

use self::events::EventDispatcher;
use self::state::{ConnectionState, CycleId};

// ============================================================================
// Submodules
// ============================================================================

/// Callback table and dispatch.
pub mod events;

mod reader;
mod reconnect;
mod state;
mod writer;

// ============================================================================
// Re-exports
// ============================================================================

pub use events::EventKind;

// ============================================================================
// Inner
// ============================================================================

/// Shared by the client handles and every worker task.
pub(crate) struct Inner {
    config: RwLock<Arc<Config>>,
    dialer: Arc<dyn Dialer>,
    state: ConnectionState,
    events: EventDispatcher,
    /// Serializes writes from the writer and from explicit close.
    send_lock: Mutex<()>,
    /// Held by the running dial loop.
    dial_lock: Mutex<Backoff>,
}

impl Inner {
    fn config_snapshot(&self) -> Arc<Config> {
        Arc::clone(&self.config.read())
    }

    /// Writes one frame on cycle `id`.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if `id` is no longer installed, otherwise
    /// whatever the transport reports.
    pub(crate) async fn write_frame(
        &self,
        id: CycleId,
        message: &Message,
        deadline: Duration,
    ) -> Result<()> {
        let _guard = self.send_lock.lock().await;
        let transport = self.state.transport(id).ok_or(Error::ConnectionClosed)?;

        trace!(cycle = id, kind = %message.kind(), len = message.len(), "Writing message");
        transport.write_message(message, deadline).await
    }

    /// Ends cycle `id` after a close frame was written through the queue.
    pub(crate) async fn finish_close(&self, id: CycleId, code: u16, reason: &str) {
        let Some(detached) = self.state.detach(Some(id), true) else {
            debug!(cycle = id, "Close already handled");
            return;
        };

        info!(cycle = id, code, reason, "Connection closed");
        self.events.closed(code, reason);
        detached.close().await;
    }
}

// ============================================================================
// Client
// ============================================================================

/// Handle to an auto-reconnecting WebSocket connection.
///
/// Cheap to clone; all clones drive the same connection. Worker tasks keep
/// the connection alive until [`Client::close`] is called, so dropping every
/// handle does not disconnect.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.inner.state.url())
            .field("connected", &self.is_connected())
            .field("terminal", &self.is_terminal())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a client for `url` using the default WebSocket dialer.
    ///
    /// Nothing is dialed until [`connect`](Self::connect) is called.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_dialer(url, Arc::new(TungsteniteDialer::new()))
    }

    /// Creates a client that opens connections through `dialer`.
    #[must_use]
    pub fn with_dialer(url: impl Into<String>, dialer: Arc<dyn Dialer>) -> Self {
        let config = Config::default();
        let backoff = Backoff::from_config(&config);

        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(Arc::new(config)),
                dialer,
                state: ConnectionState::new(url.into()),
                events: EventDispatcher::default(),
                send_lock: Mutex::new(()),
                dial_lock: Mutex::new(backoff),
            }),
        }
    }
}

// ============================================================================
// Client - Configuration
// ============================================================================

impl Client {
    /// Replaces the configuration.
    ///
    /// Takes effect from the next connection cycle; running workers keep
    /// the snapshot they started with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` fails validation. The previous
    /// configuration is kept in that case.
    pub fn set_config(&self, config: Config) -> Result<()> {
        config.validate()?;
        *self.inner.config.write() = Arc::new(config);
        Ok(())
    }

    /// Returns a copy of the current configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config::clone(&self.inner.config_snapshot())
    }

    /// Adds a header to every future handshake request.
    ///
    /// A header with the same name (case-insensitive) is replaced.
    pub fn set_request_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.state.set_header(name.into(), value.into());
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.inner.state.url()
    }
}

// ============================================================================
// Client - Callbacks
// ============================================================================

impl Client {
    /// Called after every successful dial.
    pub fn on_connected<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.connected = Some(Arc::new(f)));
    }

    /// Called for every failed dial attempt.
    pub fn on_connect_error<F>(&self, f: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.connect_error = Some(Arc::new(f)));
    }

    /// Called when an established connection is lost.
    pub fn on_disconnected<F>(&self, f: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.disconnected = Some(Arc::new(f)));
    }

    /// Called with the close code and reason when the connection is closed
    /// locally or by the peer.
    pub fn on_close<F>(&self, f: F)
    where
        F: Fn(u16, &str) + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.closed = Some(Arc::new(f)));
    }

    /// Called after a text message was written.
    pub fn on_text_message_sent<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.text_sent = Some(Arc::new(f)));
    }

    /// Called after a binary message was written.
    pub fn on_binary_message_sent<F>(&self, f: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.binary_sent = Some(Arc::new(f)));
    }

    /// Called when a queued message could not be written.
    pub fn on_sent_error<F>(&self, f: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.send_error = Some(Arc::new(f)));
    }

    /// Called when the peer pings.
    pub fn on_ping_received<F>(&self, f: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.ping_received = Some(Arc::new(f)));
    }

    /// Called when the peer answers a ping.
    pub fn on_pong_received<F>(&self, f: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.pong_received = Some(Arc::new(f)));
    }

    /// Called for every inbound text message.
    pub fn on_text_message_received<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.text_received = Some(Arc::new(f)));
    }

    /// Called for every inbound binary message.
    pub fn on_binary_message_received<F>(&self, f: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.binary_received = Some(Arc::new(f)));
    }

    /// Called on every keepalive tick, after the ping was attempted.
    pub fn on_keepalive<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.register(|h| h.keepalive = Some(Arc::new(f)));
    }
}

// ============================================================================
// Client - Status
// ============================================================================

impl Client {
    /// Returns `true` while a connection cycle is installed.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    /// Returns `true` once the client was closed for good.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.inner.state.is_terminal()
    }

    /// HTTP status of the current connection's handshake response.
    #[must_use]
    pub fn handshake_status(&self) -> Option<u16> {
        self.inner.state.handshake_status()
    }
}

// ============================================================================
// Client - Connection
// ============================================================================

impl Client {
    /// Dials until connected.
    ///
    /// Failed attempts fire the connect-error callback and are retried with
    /// backoff, without limit. Returns immediately if already connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the client was closed before or
    /// while dialing.
    pub async fn connect(&self) -> Result<()> {
        if self.is_terminal() {
            return Err(Error::ConnectionClosed);
        }
        if self.is_connected() {
            debug!("Connect called while connected");
            return Ok(());
        }

        info!(url = %self.inner.state.url(), "Connecting");
        self.inner.dial_until_connected(false).await
    }

    /// Closes the connection with an empty reason.
    pub async fn close(&self) {
        self.close_with_reason("").await;
    }

    /// Closes the connection for good.
    ///
    /// Writes a normal close frame carrying `reason`, tears down the current
    /// cycle and fires the close callback with `(1000, reason)`. The client
    /// never reconnects afterwards. Calling this again is a no-op.
    pub async fn close_with_reason(&self, reason: &str) {
        let inner = &self.inner;
        inner.state.mark_terminal();

        let detached = {
            let _guard = inner.send_lock.lock().await;
            let Some((id, transport)) = inner.state.current() else {
                debug!("Close called without connection");
                return;
            };

            let frame = Message::Close(Some(CloseFrame::normal(reason)));
            let deadline = inner.config_snapshot().write_timeout;
            if let Err(e) = transport.write_message(&frame, deadline).await {
                debug!(cycle = id, error = %e, "Close frame not delivered");
            }

            inner.state.detach(Some(id), true)
        };

        let Some(detached) = detached else {
            debug!("Close raced with another teardown");
            return;
        };

        info!(code = CLOSE_NORMAL, reason, "Connection closed");
        inner.events.closed(CLOSE_NORMAL, reason);
        detached.close().await;
    }
}

// ============================================================================
// Client - Sending
// ============================================================================

impl Client {
    /// Queues a text message.
    ///
    /// Never blocks. The sent or send-error callback reports the outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if not connected
    /// - [`Error::BufferFull`] if the outbound queue is full; the message is
    ///   dropped
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.inner.state.enqueue(Message::Text(text.into()))
    }

    /// Queues a binary message.
    ///
    /// # Errors
    ///
    /// Same as [`send_text`](Self::send_text).
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.inner.state.enqueue(Message::Binary(data.into()))
    }

    /// Queues a normal close frame behind everything already queued.
    ///
    /// Once written, the client closes for good as with
    /// [`close_with_reason`](Self::close_with_reason).
    ///
    /// # Errors
    ///
    /// Same as [`send_text`](Self::send_text).
    pub fn close_when_flushed(&self, reason: &str) -> Result<()> {
        self.inner
            .state
            .enqueue(Message::Close(Some(CloseFrame::normal(reason))))
    }
}

// ============================================================================
// Tests
// ============================================================================
