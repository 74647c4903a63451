//! Connection state and the connection cycle it owns.
//!
//! One `RwLock` guards everything that decides whether the client is usable.
//! Snapshots and enqueues take the shared lock; installing, detaching and
//! marking the client terminal take the exclusive lock.
//!
//! # Invariants
//!
//! - Connected ⇔ a [`Cycle`] is installed.
//! - A cycle is installed at most once and never reinstalled; ids grow
//!   monotonically.
//! - Detaching drops the queue sender and raises the shutdown signal inside
//!   the same critical section that clears the cycle. After that, the
//!   transport is reachable only through the returned [`Detached`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::Message;
use crate::transport::{DialRequest, Dialed, Transport};

// ============================================================================
// Types
// ============================================================================

/// Identifies one connection cycle.
pub(crate) type CycleId = u64;

/// Worker-side ends of a freshly installed cycle.
pub(crate) struct Installed {
    /// Cycle id.
    pub(crate) id: CycleId,
    /// Transport handle for the reader.
    pub(crate) transport: Arc<dyn Transport>,
    /// Queue consumer for the writer.
    pub(crate) queue: mpsc::Receiver<Message>,
    /// Raised when the cycle is detached.
    pub(crate) shutdown: watch::Receiver<bool>,
}

/// A cycle removed from the state whose transport still needs closing.
pub(crate) struct Detached {
    id: CycleId,
    transport: Arc<dyn Transport>,
}

impl Detached {
    /// Closes the transport handle.
    pub(crate) async fn close(self) {
        match self.transport.close().await {
            Ok(()) => trace!(cycle = self.id, "Transport closed"),
            Err(e) => debug!(cycle = self.id, error = %e, "Transport close failed"),
        }
    }
}

/// Live connection cycle.
struct Cycle {
    id: CycleId,
    transport: Arc<dyn Transport>,
    queue: mpsc::Sender<Message>,
    shutdown: watch::Sender<bool>,
    handshake_status: Option<u16>,
}

struct StateInner {
    cycle: Option<Cycle>,
    url: String,
    headers: Vec<(String, String)>,
    terminal: bool,
    next_id: CycleId,
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Single source of truth for "is the client usable".
pub(crate) struct ConnectionState {
    inner: RwLock<StateInner>,
}

impl ConnectionState {
    pub(crate) fn new(url: String) -> Self {
        Self {
            inner: RwLock::new(StateInner {
                cycle: None,
                url,
                headers: Vec::new(),
                terminal: false,
                next_id: 1,
            }),
        }
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub(crate) fn is_connected(&self) -> bool {
        self.inner.read().cycle.is_some()
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.inner.read().terminal
    }

    /// Returns `true` if `id` is the installed cycle.
    pub(crate) fn is_current(&self, id: CycleId) -> bool {
        self.inner.read().cycle.as_ref().is_some_and(|c| c.id == id)
    }

    pub(crate) fn handshake_status(&self) -> Option<u16> {
        self.inner
            .read()
            .cycle
            .as_ref()
            .and_then(|c| c.handshake_status)
    }

    /// Returns the transport of cycle `id` if it is still installed.
    pub(crate) fn transport(&self, id: CycleId) -> Option<Arc<dyn Transport>> {
        self.inner
            .read()
            .cycle
            .as_ref()
            .filter(|c| c.id == id)
            .map(|c| Arc::clone(&c.transport))
    }

    /// Returns the installed cycle's id and transport.
    pub(crate) fn current(&self) -> Option<(CycleId, Arc<dyn Transport>)> {
        self.inner
            .read()
            .cycle
            .as_ref()
            .map(|c| (c.id, Arc::clone(&c.transport)))
    }

    pub(crate) fn url(&self) -> String {
        self.inner.read().url.clone()
    }

    pub(crate) fn headers(&self) -> Vec<(String, String)> {
        self.inner.read().headers.clone()
    }

    /// Sets a handshake header, replacing any header with the same name.
    pub(crate) fn set_header(&self, name: String, value: String) {
        let mut state = self.inner.write();
        state.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        state.headers.push((name, value));
    }

    pub(crate) fn dial_request(&self, max_message_size: usize) -> DialRequest {
        let state = self.inner.read();
        DialRequest {
            url: state.url.clone(),
            headers: state.headers.clone(),
            max_message_size,
        }
    }

    // ========================================================================
    // Producers
    // ========================================================================

    /// Enqueues without blocking.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if no cycle is installed
    /// - [`Error::BufferFull`] if the queue is at capacity
    pub(crate) fn enqueue(&self, message: Message) -> Result<()> {
        let state = self.inner.read();
        let Some(cycle) = state.cycle.as_ref() else {
            return Err(Error::ConnectionClosed);
        };

        match cycle.queue.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::buffer_full(cycle.queue.max_capacity())),
            Err(TrySendError::Closed(_)) => Err(Error::ConnectionClosed),
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Installs a dialed transport as the new cycle.
    ///
    /// Refused when the client is terminal or a cycle is already installed;
    /// the dialed handle is handed back so the caller can close it.
    pub(crate) fn install(
        &self,
        dialed: Dialed,
        queue_capacity: usize,
    ) -> std::result::Result<Installed, Dialed> {
        let mut state = self.inner.write();
        if state.terminal || state.cycle.is_some() {
            return Err(dialed);
        }

        let id = state.next_id;
        state.next_id += 1;

        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        state.cycle = Some(Cycle {
            id,
            transport: Arc::clone(&dialed.transport),
            queue: queue_tx,
            shutdown: shutdown_tx,
            handshake_status: dialed.handshake_status,
        });

        Ok(Installed {
            id,
            transport: dialed.transport,
            queue: queue_rx,
            shutdown: shutdown_rx,
        })
    }

    /// Blocks every future install. Existing cycles are left alone.
    pub(crate) fn mark_terminal(&self) {
        self.inner.write().terminal = true;
    }

    /// Removes the installed cycle.
    ///
    /// With `Some(id)` only that cycle is removed. Returns `None` when there
    /// was nothing to remove, which makes every caller idempotent. With
    /// `terminal` the client is also marked terminal, even if nothing was
    /// removed.
    pub(crate) fn detach(&self, id: Option<CycleId>, terminal: bool) -> Option<Detached> {
        let mut state = self.inner.write();
        if terminal {
            state.terminal = true;
        }

        let matches = state
            .cycle
            .as_ref()
            .is_some_and(|c| id.is_none_or(|id| c.id == id));
        if !matches {
            return None;
        }

        let Cycle {
            id,
            transport,
            queue,
            shutdown,
            ..
        } = state.cycle.take()?;

        drop(queue);
        let _ = shutdown.send(true);

        Some(Detached { id, transport })
    }
}

// ============================================================================
// Tests
// ============================================================================
