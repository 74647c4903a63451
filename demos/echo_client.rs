//! Interactive echo client.
//!
//! Demonstrates:
//! - Registering lifecycle and message callbacks
//! - Connecting with automatic reconnect
//! - Periodic sends that survive reconnects
//! - Graceful close on Ctrl+C
//!
//! Usage:
//!   cargo run --example echo_client -- ws://127.0.0.1:9001
//!   cargo run --example echo_client -- wss://echo.example.com --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use resocket::{Client, Config, Result};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_URL: &str = "ws://127.0.0.1:9001";
const SEND_INTERVAL: Duration = Duration::from_secs(5);

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    url: String,
    debug: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self {
            url: args
                .iter()
                .find(|a| !a.starts_with("--"))
                .cloned()
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            debug: args.iter().any(|a| a == "--debug"),
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug { "resocket=debug" } else { "resocket=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Echo Client ===\n");
    println!("[1] Target: {}", args.url);

    let client = Client::new(&args.url);
    client.set_config(Config::new().with_keepalive_interval(Duration::from_secs(20)))?;

    // ========================================================================
    // Callbacks
    // ========================================================================

    client.on_connected(|| println!("    ✓ Connected"));
    client.on_connect_error(|e| println!("    ✗ Connect failed: {e}"));
    client.on_disconnected(|e| println!("    ✗ Disconnected: {e}"));
    client.on_close(|code, reason| println!("    ✓ Closed ({code}) {reason}"));
    client.on_text_message_sent(|text| println!("    -> {text}"));
    client.on_sent_error(|e| println!("    ✗ Send failed: {e}"));
    client.on_text_message_received(|text| println!("    <- {text}"));
    client.on_binary_message_received(|data| println!("    <- {} bytes", data.len()));
    client.on_pong_received(|_| println!("    <- pong"));
    client.on_keepalive(|| println!("    .. keepalive"));

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[2] Connecting...");
    client.connect().await?;

    // ========================================================================
    // Send Loop
    // ========================================================================

    println!("[3] Sending every {}s, Ctrl+C to exit\n", SEND_INTERVAL.as_secs());

    let mut ticker = tokio::time::interval(SEND_INTERVAL);
    let mut counter = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                counter += 1;
                if let Err(e) = client.send_text(format!("hello #{counter}")) {
                    println!("    ! Not sent: {e}");
                }
            }
        }
    }

    // ========================================================================
    // Close
    // ========================================================================

    println!("\n[4] Closing...");
    client.close_with_reason("demo finished").await;

    Ok(())
}
