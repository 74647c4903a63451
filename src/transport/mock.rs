//! Scripted in-memory transport for lifecycle tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::protocol::Message;

use super::{ControlHandler, DialRequest, Dialed, Dialer, Transport};

// ============================================================================
// MockDialer
// ============================================================================

/// Dialer that fails a scripted number of times, then hands out
/// [`MockTransport`]s.
#[derive(Default)]
pub(crate) struct MockDialer {
    failures: Mutex<VecDeque<String>>,
    dials: Mutex<Vec<Instant>>,
    requests: Mutex<Vec<DialRequest>>,
    connections: Mutex<Vec<Arc<MockTransport>>>,
}

impl MockDialer {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `count` dials fail.
    pub(crate) fn fail_next(&self, count: usize) {
        let mut failures = self.failures.lock();
        for n in 0..count {
            failures.push_back(format!("scripted dial failure #{n}"));
        }
    }

    pub(crate) fn dial_count(&self) -> usize {
        self.dials.lock().len()
    }

    pub(crate) fn dial_times(&self) -> Vec<Instant> {
        self.dials.lock().clone()
    }

    pub(crate) fn last_request(&self) -> Option<DialRequest> {
        self.requests.lock().last().cloned()
    }

    /// Returns the `index`-th successfully dialed transport.
    pub(crate) fn connection(&self, index: usize) -> Arc<MockTransport> {
        Arc::clone(&self.connections.lock()[index])
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, request: &DialRequest) -> Result<Dialed> {
        self.dials.lock().push(Instant::now());
        self.requests.lock().push(request.clone());

        if let Some(reason) = self.failures.lock().pop_front() {
            return Err(Error::connection(reason));
        }

        let transport = Arc::new(MockTransport::new());
        self.connections.lock().push(Arc::clone(&transport));
        Ok(Dialed {
            transport,
            handshake_status: Some(101),
        })
    }
}

// ============================================================================
// MockTransport
// ============================================================================

/// In-memory transport: inbound frames are pushed by the test, outbound
/// frames are recorded.
pub(crate) struct MockTransport {
    inbound_tx: mpsc::UnboundedSender<Result<Message>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Message>>>,
    written: Mutex<Vec<Message>>,
    written_notify: Notify,
    write_failures: AtomicUsize,
    write_delay: Mutex<Option<Duration>>,
    control: RwLock<Option<Arc<dyn ControlHandler>>>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl MockTransport {
    fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            written: Mutex::new(Vec::new()),
            written_notify: Notify::new(),
            write_failures: AtomicUsize::new(0),
            write_delay: Mutex::new(None),
            control: RwLock::new(None),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Delivers a data frame to the reader.
    pub(crate) fn push_inbound(&self, message: Message) {
        let _ = self.inbound_tx.send(Ok(message));
    }

    /// Makes the reader's next read fail.
    pub(crate) fn fail_read(&self, message: &str) {
        let _ = self.inbound_tx.send(Err(Error::connection(message)));
    }

    /// Makes the next `count` writes fail.
    pub(crate) fn fail_writes(&self, count: usize) {
        self.write_failures.store(count, Ordering::SeqCst);
    }

    /// Makes every write take `delay` before completing.
    pub(crate) fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    pub(crate) fn emit_ping(&self, payload: &[u8]) {
        if let Some(handler) = self.control() {
            handler.on_ping(payload);
        }
    }

    pub(crate) fn emit_pong(&self, payload: &[u8]) {
        if let Some(handler) = self.control() {
            handler.on_pong(payload);
        }
    }

    /// Simulates a close frame from the peer followed by end of stream.
    pub(crate) fn emit_close(&self, code: u16, reason: &str) {
        if let Some(handler) = self.control() {
            handler.on_close(code, reason);
        }
        let _ = self.inbound_tx.send(Err(Error::ConnectionClosed));
    }

    fn control(&self) -> Option<Arc<dyn ControlHandler>> {
        self.control.read().clone()
    }

    pub(crate) fn has_control_handler(&self) -> bool {
        self.control.read().is_some()
    }

    pub(crate) fn written(&self) -> Vec<Message> {
        self.written.lock().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` frames were written.
    pub(crate) async fn wait_written(&self, count: usize) -> Vec<Message> {
        loop {
            let notified = self.written_notify.notified();
            {
                let written = self.written.lock();
                if written.len() >= count {
                    return written.clone();
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read_message(&self) -> Result<Message> {
        let mut inbound = self.inbound_rx.lock().await;
        match inbound.recv().await {
            Some(result) => result,
            None => Err(Error::ConnectionClosed),
        }
    }

    async fn write_message(&self, message: &Message, deadline: Duration) -> Result<()> {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            if delay > deadline {
                tokio::time::sleep(deadline).await;
                return Err(Error::timeout_after("write", deadline));
            }
            tokio::time::sleep(delay).await;
        }

        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        let failed = self
            .write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::connection("scripted write failure"));
        }

        self.written.lock().push(message.clone());
        self.written_notify.notify_waiters();
        Ok(())
    }

    fn set_control_handler(&self, handler: Arc<dyn ControlHandler>) {
        *self.control.write() = Some(handler);
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
