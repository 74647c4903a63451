//! Writer worker: the only consumer of a cycle's outbound queue.
//!
//! The keepalive timer is polled before the queue. A tick is ready at most
//! once per interval, so the heartbeat keeps going under steady traffic
//! without starving the queue. Every message taken off the queue ends in
//! exactly one sent or send-error callback.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::Error;
use crate::protocol::{CLOSE_NORMAL, Message};

use super::Inner;
use super::state::CycleId;

// ============================================================================
// Writer Loop
// ============================================================================

/// Drains the queue until it closes or a close frame has been written.
pub(crate) async fn run(
    inner: Arc<Inner>,
    id: CycleId,
    mut queue: mpsc::Receiver<Message>,
    config: Arc<Config>,
) {
    debug!(cycle = id, "Writer started");

    let period = config.keepalive_interval;
    let mut keepalive = interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = keepalive.tick(), if inner.state.is_current(id) => {
                let ping = Message::Ping(Vec::new());
                if let Err(e) = inner.write_frame(id, &ping, config.write_timeout).await {
                    debug!(cycle = id, error = %e, "Keepalive ping failed");
                }
                inner.events.keepalive();
            }
            message = queue.recv() => {
                let Some(message) = message else {
                    break;
                };
                if !deliver(&inner, id, message, &config).await {
                    break;
                }
            }
        }
    }

    // Anything accepted after the close frame can no longer go out.
    queue.close();
    while let Ok(message) = queue.try_recv() {
        trace!(cycle = id, kind = %message.kind(), "Dropping message queued after close");
        inner.events.send_error(&Error::ConnectionClosed);
    }

    debug!(cycle = id, "Writer stopped");
}

/// Writes one message and fires its callback.
///
/// Returns `false` once a close frame went out.
async fn deliver(inner: &Inner, id: CycleId, message: Message, config: &Config) -> bool {
    // The peer's close reply may race `finish_close`; either way the client
    // must not come back.
    if matches!(message, Message::Close(_)) {
        inner.state.mark_terminal();
    }

    if let Err(e) = inner.write_frame(id, &message, config.write_timeout).await {
        debug!(cycle = id, kind = %message.kind(), error = %e, "Write failed");
        inner.events.send_error(&e);
        return true;
    }

    match message {
        Message::Text(text) => {
            inner.events.text_sent(&text);
            true
        }
        Message::Binary(data) => {
            inner.events.binary_sent(&data);
            true
        }
        Message::Close(frame) => {
            let (code, reason) = frame.map_or((CLOSE_NORMAL, String::new()), |f| (f.code, f.reason));
            inner.finish_close(id, code, &reason).await;
            false
        }
        Message::Ping(_) | Message::Pong(_) => true,
    }
}
