//! Dial loop and connection cycle startup.
//!
//! Only one dial loop runs at a time. The loop holds the dial lock, which
//! also owns the [`Backoff`] state, from its first attempt until it either
//! installs a cycle or sees the client turn terminal.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::{ControlHandler, Dialed};

use super::Inner;
use super::state::{CycleId, Installed};
use super::{reader, writer};

// ============================================================================
// Dial Loop
// ============================================================================

impl Inner {
    /// Dials until a cycle is installed.
    ///
    /// With `delay_first` one backoff delay is waited before the first
    /// attempt. Returns `Ok` as soon as the client is connected, even when
    /// another loop did the work.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] once the client is terminal.
    pub(crate) async fn dial_until_connected(self: &Arc<Self>, delay_first: bool) -> Result<()> {
        let mut backoff = self.dial_lock.lock().await;
        let mut delay_pending = delay_first;

        loop {
            if self.state.is_terminal() {
                debug!("Dial loop stopped, client is closed");
                return Err(Error::ConnectionClosed);
            }
            if self.state.is_connected() {
                return Ok(());
            }

            let config = self.config_snapshot();
            backoff.reconfigure(&config);

            if delay_pending {
                delay_pending = false;
                let delay = backoff.next_delay();
                debug!(delay_ms = millis(delay), "Waiting before redial");
                sleep(delay).await;
                continue;
            }

            let request = self.state.dial_request(config.max_message_size);
            match self.dialer.dial(&request).await {
                Ok(dialed) => {
                    backoff.reset();
                    self.start_cycle(dialed, config).await;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        url = %request.url,
                        attempt = backoff.attempt(),
                        retry_ms = millis(delay),
                        error = %e,
                        "Dial failed"
                    );
                    self.events.connect_error(&e);
                    sleep(delay).await;
                }
            }
        }
    }

    /// Starts a redial on its own task after one backoff delay.
    pub(crate) fn schedule_reconnect(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = inner.dial_until_connected(true).await {
                debug!(error = %e, "Reconnect abandoned");
            }
        });
    }

    /// Installs a dialed transport and spawns its workers.
    ///
    /// A refused install closes the fresh transport; the dial loop then
    /// re-checks the state and exits.
    async fn start_cycle(self: &Arc<Self>, dialed: Dialed, config: Arc<Config>) {
        let handshake_status = dialed.handshake_status;
        let Installed {
            id,
            transport,
            queue,
            shutdown,
        } = match self.state.install(dialed, config.queue_capacity) {
            Ok(installed) => installed,
            Err(refused) => {
                debug!("Discarding dialed transport, client state changed");
                if let Err(e) = refused.transport.close().await {
                    debug!(error = %e, "Discarded transport close failed");
                }
                return;
            }
        };

        transport.set_control_handler(Arc::new(ControlBridge {
            inner: Arc::downgrade(self),
            id,
        }));

        info!(
            cycle = id,
            url = %self.state.url(),
            status = ?handshake_status,
            "Connection established"
        );
        self.events.connected();

        tokio::spawn(reader::run(
            Arc::clone(self),
            id,
            transport,
            shutdown,
            Arc::clone(&config),
        ));
        tokio::spawn(writer::run(Arc::clone(self), id, queue, config));
    }
}

#[inline]
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// ControlBridge
// ============================================================================

/// Routes one cycle's control frames into the callback table.
struct ControlBridge {
    inner: Weak<Inner>,
    id: CycleId,
}

impl ControlHandler for ControlBridge {
    fn on_ping(&self, payload: &[u8]) {
        if let Some(inner) = self.inner.upgrade() {
            inner.events.ping_received(payload);
        }
    }

    fn on_pong(&self, payload: &[u8]) {
        if let Some(inner) = self.inner.upgrade() {
            inner.events.pong_received(payload);
        }
    }

    fn on_close(&self, code: u16, reason: &str) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        // The peer ended the session; leave the client idle instead of redialing.
        let Some(detached) = inner.state.detach(Some(self.id), false) else {
            debug!(cycle = self.id, code, "Close frame on detached cycle");
            return;
        };

        info!(cycle = self.id, code, reason, "Connection closed by peer");
        inner.events.closed(code, reason);
        tokio::spawn(detached.close());
    }
}
