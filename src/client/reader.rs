//! Reader worker: one per connection cycle.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::Error;
use crate::protocol::Message;
use crate::transport::Transport;

use super::Inner;
use super::state::CycleId;

// ============================================================================
// Reader Loop
// ============================================================================

/// Reads until the transport fails or the cycle is detached.
pub(crate) async fn run(
    inner: Arc<Inner>,
    id: CycleId,
    transport: Arc<dyn Transport>,
    mut shutdown: watch::Receiver<bool>,
    config: Arc<Config>,
) {
    debug!(cycle = id, "Reader started");

    loop {
        let result = tokio::select! {
            biased;

            _ = shutdown.changed() => break,
            result = transport.read_message() => result,
        };

        match result {
            Ok(Message::Text(text)) => {
                trace!(cycle = id, len = text.len(), "Text message received");
                inner.events.text_received(&text);
            }
            Ok(Message::Binary(data)) => {
                trace!(cycle = id, len = data.len(), "Binary message received");
                inner.events.binary_received(&data);
            }
            Ok(other) => {
                trace!(cycle = id, kind = %other.kind(), "Ignoring inbound message");
            }
            Err(e) => {
                handle_read_failure(&inner, id, e, &config).await;
                break;
            }
        }
    }

    debug!(cycle = id, "Reader stopped");
}

/// Tears down the cycle after a read error, if it is still installed.
async fn handle_read_failure(inner: &Arc<Inner>, id: CycleId, error: Error, config: &Config) {
    let reconnect = config.enable_reconnect;

    let Some(detached) = inner.state.detach(Some(id), !reconnect) else {
        debug!(cycle = id, error = %error, "Read ended on detached cycle");
        return;
    };

    warn!(cycle = id, error = %error, reconnect, "Connection lost");
    inner.events.disconnected(&error);
    detached.close().await;

    if reconnect && !inner.state.is_terminal() {
        inner.schedule_reconnect();
    }
}
