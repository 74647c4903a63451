//! WebSocket transport over `tokio-tungstenite`.
//!
//! The stream is split once after the handshake: the read half is owned by
//! whoever calls [`Transport::read_message`], the write half is shared by
//! writes and [`Transport::close`]. Both halves sit behind their own async
//! mutex so a blocked read never delays a write.
//!
//! Control frames never reach the caller. Pings, pongs and close frames are
//! reported to the installed [`ControlHandler`]; tungstenite itself queues the
//! pong and close replies, which go out with the next read or write.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame as WsCloseFrame, WebSocketConfig};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{CLOSE_NO_STATUS, CloseFrame, Message};

use super::{ControlHandler, DialRequest, Dialed, Dialer, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for flushing the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// TungsteniteDialer
// ============================================================================

/// Dials `ws://` / `wss://` endpoints with `tokio-tungstenite`.
///
/// `wss://` requires one of the crate's TLS features.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteDialer {
    disable_nagle: bool,
}

impl TungsteniteDialer {
    /// Creates a dialer with default socket options.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            disable_nagle: false,
        }
    }

    /// Sets `TCP_NODELAY` on dialed sockets.
    #[inline]
    #[must_use]
    pub const fn with_nodelay(mut self) -> Self {
        self.disable_nagle = true;
        self
    }
}

#[async_trait]
impl Dialer for TungsteniteDialer {
    async fn dial(&self, request: &DialRequest) -> Result<Dialed> {
        let url = Url::parse(&request.url).map_err(|e| Error::invalid_url(&request.url, e))?;

        let mut http_request = url.as_str().into_client_request()?;
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("Invalid header name '{name}': {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("Invalid value for header '{name}': {e}")))?;
            http_request.headers_mut().append(header_name, header_value);
        }

        let config = WebSocketConfig::default()
            .max_message_size(Some(request.max_message_size))
            .max_frame_size(Some(request.max_message_size));

        let (stream, response) =
            connect_async_with_config(http_request, Some(config), self.disable_nagle).await?;
        let status = response.status().as_u16();

        debug!(url = %url, status, "WebSocket handshake completed");

        Ok(Dialed {
            transport: Arc::new(TungsteniteTransport::new(stream)),
            handshake_status: Some(status),
        })
    }
}

// ============================================================================
// TungsteniteTransport
// ============================================================================

/// [`Transport`] over a split [`WebSocketStream`].
pub struct TungsteniteTransport<S = MaybeTlsStream<TcpStream>> {
    /// Write half, shared by writes and close.
    sink: Mutex<SplitSink<WebSocketStream<S>, WsMessage>>,
    /// Read half.
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
    /// Control frame observer.
    control: RwLock<Option<Arc<dyn ControlHandler>>>,
    /// Set once `close` has run.
    closed: AtomicBool,
}

impl<S> TungsteniteTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an established WebSocket stream.
    #[must_use]
    pub fn new(ws_stream: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws_stream.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            control: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn control(&self) -> Option<Arc<dyn ControlHandler>> {
        self.control.read().clone()
    }
}

#[async_trait]
impl<S> Transport for TungsteniteTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_message(&self) -> Result<Message> {
        let mut stream = self.stream.lock().await;

        loop {
            let Some(frame) = stream.next().await else {
                debug!("WebSocket stream ended");
                return Err(Error::ConnectionClosed);
            };

            match frame? {
                WsMessage::Text(text) => return Ok(Message::Text(text.as_str().to_owned())),
                WsMessage::Binary(data) => return Ok(Message::Binary(data.to_vec())),
                WsMessage::Ping(payload) => {
                    trace!(len = payload.len(), "Ping received");
                    if let Some(handler) = self.control() {
                        handler.on_ping(&payload);
                    }
                }
                WsMessage::Pong(payload) => {
                    trace!(len = payload.len(), "Pong received");
                    if let Some(handler) = self.control() {
                        handler.on_pong(&payload);
                    }
                }
                WsMessage::Close(frame) => {
                    let (code, reason) = frame.map_or_else(
                        || (CLOSE_NO_STATUS, String::new()),
                        |f| (u16::from(f.code), f.reason.as_str().to_owned()),
                    );
                    debug!(code, reason = %reason, "Close frame received");
                    if let Some(handler) = self.control() {
                        handler.on_close(code, &reason);
                    }
                }
                WsMessage::Frame(_) => {}
            }
        }
    }

    async fn write_message(&self, message: &Message, deadline: Duration) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let frame = to_ws_message(message);
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(frame).await
        };

        match timeout(deadline, write).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::timeout_after(
                format!("write {} message", message.kind()),
                deadline,
            )),
        }
    }

    fn set_control_handler(&self, handler: Arc<dyn ControlHandler>) {
        *self.control.write() = Some(handler);
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut sink = self.sink.lock().await;
        match timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) | Ok(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(Error::timeout_after("close handshake", CLOSE_TIMEOUT)),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn to_ws_message(message: &Message) -> WsMessage {
    match message {
        Message::Text(text) => WsMessage::Text(text.clone().into()),
        Message::Binary(data) => WsMessage::Binary(data.clone().into()),
        Message::Ping(data) => WsMessage::Ping(data.clone().into()),
        Message::Pong(data) => WsMessage::Pong(data.clone().into()),
        Message::Close(frame) => WsMessage::Close(frame.as_ref().map(to_ws_close_frame)),
    }
}

fn to_ws_close_frame(frame: &CloseFrame) -> WsCloseFrame {
    WsCloseFrame {
        code: CloseCode::from(frame.code),
        reason: frame.reason.clone().into(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::future::Future;

    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    const DEADLINE: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct Recorder {
        pings: parking_lot::Mutex<Vec<Vec<u8>>>,
        pongs: parking_lot::Mutex<Vec<Vec<u8>>>,
        closes: parking_lot::Mutex<Vec<(u16, String)>>,
    }

    impl ControlHandler for Recorder {
        fn on_ping(&self, payload: &[u8]) {
            self.pings.lock().push(payload.to_vec());
        }

        fn on_pong(&self, payload: &[u8]) {
            self.pongs.lock().push(payload.to_vec());
        }

        fn on_close(&self, code: u16, reason: &str) {
            self.closes.lock().push((code, reason.to_owned()));
        }
    }

    async fn spawn_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("upgrade");
            handler(ws).await;
        });
        format!("ws://127.0.0.1:{port}")
    }

    fn request(url: String) -> DialRequest {
        DialRequest {
            url,
            headers: Vec::new(),
            max_message_size: 1024 * 1024,
        }
    }

    async fn echo(mut ws: WebSocketStream<TcpStream>) {
        while let Some(Ok(frame)) = ws.next().await {
            if (frame.is_text() || frame.is_binary()) && ws.send(frame).await.is_err() {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_dial_and_echo() {
        let url = spawn_server(echo).await;
        let dialed = TungsteniteDialer::new()
            .dial(&request(url))
            .await
            .expect("dial should succeed");

        assert_eq!(dialed.handshake_status, Some(101));
        let transport = dialed.transport;

        transport
            .write_message(&Message::from("hello"), DEADLINE)
            .await
            .expect("write text");
        transport
            .write_message(&Message::Binary(vec![1, 2, 3]), DEADLINE)
            .await
            .expect("write binary");

        assert_eq!(
            transport.read_message().await.expect("read"),
            Message::Text("hello".into())
        );
        assert_eq!(
            transport.read_message().await.expect("read"),
            Message::Binary(vec![1, 2, 3])
        );
    }

    #[tokio::test]
    async fn test_control_frames_reach_handler() {
        let url = spawn_server(|mut ws| async move {
            ws.send(WsMessage::Ping(vec![7, 7].into())).await.ok();
            ws.send(WsMessage::Pong(vec![9].into())).await.ok();
            ws.send(WsMessage::Text("after".into())).await.ok();
            ws.send(WsMessage::Close(Some(WsCloseFrame {
                code: CloseCode::from(4000),
                reason: "bye".into(),
            })))
            .await
            .ok();
            while ws.next().await.is_some() {}
        })
        .await;

        let transport = TungsteniteDialer::new()
            .dial(&request(url))
            .await
            .expect("dial")
            .transport;
        let recorder = Arc::new(Recorder::default());
        transport.set_control_handler(recorder.clone());

        assert_eq!(
            transport.read_message().await.expect("text after ping"),
            Message::Text("after".into())
        );
        assert!(transport.read_message().await.is_err());

        assert_eq!(*recorder.pings.lock(), vec![vec![7, 7]]);
        assert_eq!(*recorder.pongs.lock(), vec![vec![9]]);
        assert_eq!(*recorder.closes.lock(), vec![(4000, "bye".to_string())]);
    }

    #[tokio::test]
    async fn test_request_headers_are_sent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let (header_tx, header_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let callback = move |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
                let token = req
                    .headers()
                    .get("x-token")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let _ = header_tx.send(token);
                Ok(resp)
            };
            let ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .expect("upgrade");
            echo(ws).await;
        });

        let mut dial_request = request(format!("ws://127.0.0.1:{port}"));
        dial_request
            .headers
            .push(("X-Token".to_string(), "secret".to_string()));

        let _dialed = TungsteniteDialer::new()
            .dial(&dial_request)
            .await
            .expect("dial");

        assert_eq!(header_rx.await.expect("header"), Some("secret".to_string()));
    }

    #[tokio::test]
    async fn test_read_limit_is_enforced() {
        let url = spawn_server(|mut ws| async move {
            ws.send(WsMessage::Binary(vec![0u8; 64].into())).await.ok();
            while ws.next().await.is_some() {}
        })
        .await;

        let mut dial_request = request(url);
        dial_request.max_message_size = 16;
        let transport = TungsteniteDialer::new()
            .dial(&dial_request)
            .await
            .expect("dial")
            .transport;

        let err = transport.read_message().await.unwrap_err();
        assert!(matches!(err, Error::WebSocket(_)));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = TungsteniteDialer::new()
            .dial(&request("not a url".to_string()))
            .await
            .err()
            .expect("dial should fail");
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_refused_dial() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let result = TungsteniteDialer::new()
            .dial(&request(format!("ws://127.0.0.1:{port}")))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let url = spawn_server(echo).await;
        let transport = TungsteniteDialer::new()
            .dial(&request(url))
            .await
            .expect("dial")
            .transport;

        transport.close().await.expect("first close");
        transport.close().await.expect("second close");

        let err = transport
            .write_message(&Message::from("late"), DEADLINE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[test]
    fn test_close_frame_conversion() {
        let frame = to_ws_close_frame(&CloseFrame::normal("done"));
        assert_eq!(frame.code, CloseCode::Normal);
        assert_eq!(frame.reason.as_str(), "done");

        assert!(matches!(to_ws_message(&Message::Close(None)), WsMessage::Close(None)));
    }
}
