//! `tokio-tungstenite` transport and its I/O loop.
//!
//! [`TungsteniteTransport`] owns a spawned task that performs the client
//! handshake and then shuttles frames between the socket and the facade.
//!
//! # Event Loop
//!
//! The task handles:
//!
//! - The handshake, racing an optional connect timeout and close requests
//! - Incoming frames (text/binary become `message` notifications)
//! - Outgoing payloads from `transmit`, each completed exactly once
//! - The close handshake, bounded by an optional close timeout, ending with
//!   a single `close` notification

// ============================================================================
// Imports
// ============================================================================

use std::future;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{CloseCode, CloseFrame, Data, SubProtocols};

use super::{Completion, Notifier, Transport};

// ============================================================================
// Types
// ============================================================================

/// Client stream type produced by `connect_async`.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the client stream.
type WsSink = SplitSink<WsStream, Message>;

/// Commands from the facade to the I/O task.
enum TransportCommand {
    /// Send a payload and report the outcome.
    Transmit {
        data: Data,
        completion: Completion,
    },
    /// Start the close handshake (or abandon the opening one).
    Close,
}

/// Outcome of the opening handshake.
enum Handshake {
    Open(WsStream),
    Aborted,
    Failed(Error),
}

// ============================================================================
// Request Building
// ============================================================================

/// Builds the client handshake request.
///
/// Adds `Sec-WebSocket-Protocol` when sub-protocols were requested, then the
/// extra headers in order.
///
/// # Errors
///
/// - [`Error::WebSocket`] if tungstenite rejects the URL
/// - [`Error::Config`] if a header name or value is invalid
pub fn build_request(
    url: &Url,
    protocols: &SubProtocols,
    headers: &[(String, String)],
) -> Result<Request> {
    let mut request = url.as_str().into_client_request()?;

    if let Some(value) = protocols.header_value() {
        let value = HeaderValue::from_str(&value)
            .map_err(|e| Error::config(format!("invalid sub-protocol header: {e}")))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::config(format!("invalid header name {name:?}: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| Error::config(format!("invalid value for header {name:?}: {e}")))?;
        request.headers_mut().append(header_name, header_value);
    }

    Ok(request)
}

// ============================================================================
// TungsteniteTransport
// ============================================================================

/// [`Transport`] backed by a `tokio-tungstenite` client connection.
///
/// Dropping the transport closes the connection.
#[derive(Debug)]
pub struct TungsteniteTransport {
    /// Channel for sending commands to the I/O task.
    command_tx: mpsc::UnboundedSender<TransportCommand>,
}

impl std::fmt::Debug for TransportCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transmit { data, .. } => f
                .debug_struct("Transmit")
                .field("len", &data.len())
                .finish_non_exhaustive(),
            Self::Close => f.write_str("Close"),
        }
    }
}

impl TungsteniteTransport {
    /// Starts connecting on `runtime` and returns immediately.
    ///
    /// Progress is reported through `notifier`. `close_timeout` bounds the
    /// wait for the peer's close reply; on expiry the connection is dropped
    /// and reported closed abnormally.
    pub fn connect(
        request: Request,
        connect_timeout: Option<Duration>,
        close_timeout: Option<Duration>,
        notifier: Notifier,
        runtime: &Handle,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        runtime.spawn(Self::run(
            request,
            connect_timeout,
            close_timeout,
            command_rx,
            notifier,
        ));

        Self { command_tx }
    }

    /// I/O task: handshake, then frame loop, then the final notification.
    async fn run(
        request: Request,
        connect_timeout: Option<Duration>,
        close_timeout: Option<Duration>,
        mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
        notifier: Notifier,
    ) {
        let uri = request.uri().to_string();

        let ws_stream = match Self::handshake(request, connect_timeout, &mut command_rx).await {
            Handshake::Open(stream) => stream,
            Handshake::Aborted => {
                debug!(%uri, "Close requested before open, handshake abandoned");
                return;
            }
            Handshake::Failed(err) => {
                warn!(%uri, error = %err, "WebSocket handshake failed");
                notifier.error(err);
                notifier.close(Some(CloseFrame::abnormal()));
                return;
            }
        };

        debug!(%uri, "WebSocket connection established");
        notifier.open();

        let close_frame =
            Self::run_frame_loop(ws_stream, close_timeout, &mut command_rx, &notifier).await;

        notifier.close(Some(close_frame.unwrap_or_else(CloseFrame::abnormal)));
        debug!(%uri, "Transport loop terminated");
    }

    /// Runs the opening handshake.
    ///
    /// Transmissions requested meanwhile fail with [`Error::InvalidState`].
    async fn handshake(
        request: Request,
        connect_timeout: Option<Duration>,
        command_rx: &mut mpsc::UnboundedReceiver<TransportCommand>,
    ) -> Handshake {
        let connect = connect_async(request);
        tokio::pin!(connect);

        let deadline = async move {
            match connect_timeout {
                Some(limit) => sleep(limit).await,
                None => future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok((stream, response)) => {
                            trace!(status = %response.status(), "Handshake response received");
                            Handshake::Open(stream)
                        }
                        Err(e) => Handshake::Failed(Error::WebSocket(e)),
                    };
                }

                () = &mut deadline => {
                    let timeout_ms = connect_timeout.map_or(0, millis);
                    return Handshake::Failed(Error::connection_timeout(timeout_ms));
                }

                command = command_rx.recv() => {
                    match command {
                        Some(TransportCommand::Transmit { completion, .. }) => {
                            completion(Err(Error::invalid_state("WebSocket is still connecting")));
                        }
                        Some(TransportCommand::Close) | None => return Handshake::Aborted,
                    }
                }
            }
        }
    }

    /// Moves frames until the stream ends.
    ///
    /// Returns the close frame received from the peer, if any.
    async fn run_frame_loop(
        ws_stream: WsStream,
        close_timeout: Option<Duration>,
        command_rx: &mut mpsc::UnboundedReceiver<TransportCommand>,
        notifier: &Notifier,
    ) -> Option<CloseFrame> {
        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut close_frame = None;
        let mut closing = false;
        let mut close_deadline = None;
        let mut commands_open = true;

        loop {
            tokio::select! {
                // Incoming frames from the peer
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(len = text.len(), "Text message received");
                            notifier.message(Data::Text(text.as_str().to_owned()));
                        }

                        Some(Ok(Message::Binary(bytes))) => {
                            trace!(len = bytes.len(), "Binary message received");
                            notifier.message(Data::Binary(bytes.to_vec()));
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "Close frame received");
                            close_frame = Some(frame.map_or_else(
                                || CloseFrame::new(CloseCode::NO_STATUS, ""),
                                CloseFrame::from,
                            ));
                        }

                        // Ignore Ping, Pong, raw frames
                        Some(Ok(_)) => {}

                        Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            notifier.error(Error::WebSocket(e));
                            break;
                        }
                    }
                }

                // Commands from the facade
                command = command_rx.recv(), if commands_open => {
                    match command {
                        Some(TransportCommand::Transmit { data, completion }) => {
                            if closing {
                                completion(Err(Error::ConnectionClosed));
                                continue;
                            }
                            let len = data.len();
                            let result = ws_write.send(Message::from(data)).await.map_err(Error::from);
                            trace!(len, ok = result.is_ok(), "Message sent");
                            completion(result);
                        }

                        Some(TransportCommand::Close) => {
                            if Self::start_close(&mut ws_write, &mut closing).await {
                                close_deadline = close_timeout.map(|t| Instant::now() + t);
                            }
                        }

                        None => {
                            debug!("Transport dropped, closing connection");
                            commands_open = false;
                            if Self::start_close(&mut ws_write, &mut closing).await {
                                close_deadline = close_timeout.map(|t| Instant::now() + t);
                            }
                        }
                    }
                }

                // Peer never answered our close frame
                () = Self::wait_until(close_deadline) => {
                    warn!(
                        timeout_ms = close_timeout.map_or(0, millis),
                        "Close handshake timed out"
                    );
                    break;
                }
            }
        }

        close_frame
    }

    /// Sends our close frame once; returns `true` on the first call.
    async fn start_close(ws_write: &mut WsSink, closing: &mut bool) -> bool {
        if *closing {
            return false;
        }
        *closing = true;

        if let Err(e) = ws_write.close().await {
            debug!(error = %e, "Failed to send close frame");
        }
        true
    }

    /// Resolves at `deadline`, or never.
    async fn wait_until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => future::pending::<()>().await,
        }
    }
}

/// Milliseconds in `duration`, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Transport for TungsteniteTransport {
    fn transmit(&self, data: Data, completion: Completion) {
        let command = TransportCommand::Transmit { data, completion };
        if let Err(e) = self.command_tx.send(command) {
            // I/O task already finished
            if let TransportCommand::Transmit { completion, .. } = e.0 {
                completion(Err(Error::ConnectionClosed));
            }
        }
    }

    fn request_close(&self) {
        if self.command_tx.send(TransportCommand::Close).is_err() {
            trace!("Close requested after transport finished");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
