//! Callback table and dispatch.
//!
//! Handlers are invoked synchronously on the task that observed the event.
//! Each dispatch clones the handler out of the table first, so a handler may
//! register other handlers without deadlocking.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::Error;

// ============================================================================
// Handler Types
// ============================================================================

/// Handler for events without payload.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Handler receiving an error.
pub type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Handler receiving a close code and reason.
pub type CloseHook = Arc<dyn Fn(u16, &str) + Send + Sync>;

/// Handler receiving a text payload.
pub type TextHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Handler receiving a binary payload.
pub type BytesHook = Arc<dyn Fn(&[u8]) + Send + Sync>;

// ============================================================================
// EventKind
// ============================================================================

/// Lifecycle and traffic events a handler can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A connection cycle was installed.
    Connected,
    /// A dial attempt failed.
    ConnectError,
    /// An established connection was lost.
    Disconnected,
    /// The connection was closed locally or by the peer.
    Closed,
    /// A text message was written.
    TextSent,
    /// A binary message was written.
    BinarySent,
    /// A queued message could not be written.
    SendError,
    /// A ping arrived.
    PingReceived,
    /// A pong arrived.
    PongReceived,
    /// A text message arrived.
    TextReceived,
    /// A binary message arrived.
    BinaryReceived,
    /// The keepalive timer fired.
    Keepalive,
}

impl EventKind {
    /// Returns the event name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::ConnectError => "connect_error",
            Self::Disconnected => "disconnected",
            Self::Closed => "closed",
            Self::TextSent => "text_sent",
            Self::BinarySent => "binary_sent",
            Self::SendError => "send_error",
            Self::PingReceived => "ping_received",
            Self::PongReceived => "pong_received",
            Self::TextReceived => "text_received",
            Self::BinaryReceived => "binary_received",
            Self::Keepalive => "keepalive",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// One optional handler per event.
#[derive(Default, Clone)]
pub(crate) struct Handlers {
    pub(crate) connected: Option<Hook>,
    pub(crate) connect_error: Option<ErrorHook>,
    pub(crate) disconnected: Option<ErrorHook>,
    pub(crate) closed: Option<CloseHook>,
    pub(crate) text_sent: Option<TextHook>,
    pub(crate) binary_sent: Option<BytesHook>,
    pub(crate) send_error: Option<ErrorHook>,
    pub(crate) ping_received: Option<BytesHook>,
    pub(crate) pong_received: Option<BytesHook>,
    pub(crate) text_received: Option<TextHook>,
    pub(crate) binary_received: Option<BytesHook>,
    pub(crate) keepalive: Option<Hook>,
}

// ============================================================================
// EventDispatcher
// ============================================================================

/// Owns the callback table.
#[derive(Default)]
pub(crate) struct EventDispatcher {
    handlers: RwLock<Handlers>,
}

impl EventDispatcher {
    /// Updates the table under the write lock.
    pub(crate) fn register(&self, update: impl FnOnce(&mut Handlers)) {
        update(&mut self.handlers.write());
    }

    /// Clones one handler out of the table.
    fn hook<T>(&self, kind: EventKind, select: impl FnOnce(&Handlers) -> Option<T>) -> Option<T> {
        let hook = select(&self.handlers.read());
        if hook.is_some() {
            trace!(event = %kind, "Dispatching event");
        }
        hook
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub(crate) fn connected(&self) {
        if let Some(hook) = self.hook(EventKind::Connected, |h| h.connected.clone()) {
            hook();
        }
    }

    pub(crate) fn connect_error(&self, error: &Error) {
        if let Some(hook) = self.hook(EventKind::ConnectError, |h| h.connect_error.clone()) {
            hook(error);
        }
    }

    pub(crate) fn disconnected(&self, error: &Error) {
        if let Some(hook) = self.hook(EventKind::Disconnected, |h| h.disconnected.clone()) {
            hook(error);
        }
    }

    pub(crate) fn closed(&self, code: u16, reason: &str) {
        if let Some(hook) = self.hook(EventKind::Closed, |h| h.closed.clone()) {
            hook(code, reason);
        }
    }

    pub(crate) fn keepalive(&self) {
        if let Some(hook) = self.hook(EventKind::Keepalive, |h| h.keepalive.clone()) {
            hook();
        }
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    pub(crate) fn text_sent(&self, text: &str) {
        if let Some(hook) = self.hook(EventKind::TextSent, |h| h.text_sent.clone()) {
            hook(text);
        }
    }

    pub(crate) fn binary_sent(&self, data: &[u8]) {
        if let Some(hook) = self.hook(EventKind::BinarySent, |h| h.binary_sent.clone()) {
            hook(data);
        }
    }

    pub(crate) fn send_error(&self, error: &Error) {
        if let Some(hook) = self.hook(EventKind::SendError, |h| h.send_error.clone()) {
            hook(error);
        }
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    pub(crate) fn ping_received(&self, payload: &[u8]) {
        if let Some(hook) = self.hook(EventKind::PingReceived, |h| h.ping_received.clone()) {
            hook(payload);
        }
    }

    pub(crate) fn pong_received(&self, payload: &[u8]) {
        if let Some(hook) = self.hook(EventKind::PongReceived, |h| h.pong_received.clone()) {
            hook(payload);
        }
    }

    pub(crate) fn text_received(&self, text: &str) {
        if let Some(hook) = self.hook(EventKind::TextReceived, |h| h.text_received.clone()) {
            hook(text);
        }
    }

    pub(crate) fn binary_received(&self, data: &[u8]) {
        if let Some(hook) = self.hook(EventKind::BinaryReceived, |h| h.binary_received.clone()) {
            hook(data);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_unregistered_event_is_noop() {
        let events = EventDispatcher::default();
        events.connected();
        events.closed(1000, "bye");
        events.text_received("ignored");
    }

    #[test]
    fn test_registered_handler_receives_payload() {
        let events = EventDispatcher::default();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        events.register(|h| {
            h.closed = Some(Arc::new(move |code: u16, reason: &str| {
                sink.lock().push((code, reason.to_string()));
            }));
        });

        events.closed(1001, "going away");
        assert_eq!(*seen.lock(), vec![(1001, "going away".to_string())]);
    }

    #[test]
    fn test_register_replaces_handler() {
        let events = EventDispatcher::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        events.register(|h| {
            h.keepalive = Some(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        });
        let counter = Arc::clone(&second);
        events.register(|h| {
            h.keepalive = Some(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        });

        events.keepalive();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_register_from_inside_dispatch() {
        let events = Arc::new(EventDispatcher::default());
        let fired = Arc::new(AtomicUsize::new(0));

        let inner_events = Arc::clone(&events);
        let inner_fired = Arc::clone(&fired);
        events.register(|h| {
            h.connected = Some(Arc::new(move || {
                let fired = Arc::clone(&inner_fired);
                inner_events.register(|h| {
                    h.keepalive = Some(Arc::new(move || {
                        fired.fetch_add(1, Ordering::SeqCst);
                    }));
                });
            }));
        });

        events.connected();
        events.keepalive();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(EventKind::SendError.to_string(), "send_error");
        assert_eq!(EventKind::BinaryReceived.to_string(), "binary_received");
    }
}
