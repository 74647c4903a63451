//! Resocket - Auto-reconnecting WebSocket client.
//!
//! This library keeps a long-lived WebSocket usable across network failures.
//! Application code queues messages and registers callbacks; the client
//! writes, reads, sends keepalive pings and redials with backoff on its own.
//!
//! # Architecture
//!
//! Each successful dial starts a connection cycle:
//!
//! - **Writer task**: sole consumer of the cycle's bounded outbound queue,
//!   also drives the keepalive ping
//! - **Reader task**: delivers inbound messages, detects broken transports
//! - **Reconnector**: dial loop with jittered exponential backoff
//!
//! Key design principles:
//!
//! - Sends never block: a full queue fails fast with [`Error::BufferFull`]
//! - A cycle is torn down exactly once, whoever notices the failure first
//! - Writes never reach a transport whose cycle was detached
//!
//! # Quick Start
//!
//! ```no_run
//! use resocket::{Client, Config, Result};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::new("wss://stream.example.com/ws");
//!     client.set_config(Config::new().with_keepalive_interval(Duration::from_secs(30)))?;
//!
//!     client.on_connected(|| println!("connected"));
//!     client.on_text_message_received(|text| println!("<- {text}"));
//!     client.on_disconnected(|e| eprintln!("lost connection: {e}"));
//!
//!     client.connect().await?;
//!     client.send_text(r#"{"op":"subscribe","channel":"ticker"}"#)?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`backoff`] | Reconnect delay policy |
//! | [`client`] | [`Client`] handle, workers and callbacks |
//! | [`config`] | [`Config`] and defaults |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Message model |
//! | [`transport`] | [`Dialer`] / [`Transport`] traits and the default WebSocket transport |
//!
//! # Features
//!
//! - `native-tls`: `wss://` via the platform TLS stack
//! - `rustls`: `wss://` via rustls with webpki roots

// ============================================================================
// Modules
// ============================================================================

/// Reconnect backoff policy.
pub mod backoff;

/// Auto-reconnecting client.
///
/// Use [`Client::new()`] to create a client for a URL.
pub mod client;

/// Client configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// WebSocket message model.
pub mod protocol;

/// Transport abstraction.
///
/// The client dials through a [`Dialer`] and talks to the resulting
/// [`Transport`]. [`TungsteniteDialer`] is used unless another dialer is
/// supplied through [`Client::with_dialer()`].
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, EventKind};

// Configuration
pub use backoff::Backoff;
pub use config::Config;

// Error types
pub use error::{Error, Result};

// Message types
pub use protocol::{CloseFrame, Message, MessageKind};

// Transport types
pub use transport::{
    ControlHandler, DialRequest, Dialed, Dialer, Transport, TungsteniteDialer,
    TungsteniteTransport,
};
