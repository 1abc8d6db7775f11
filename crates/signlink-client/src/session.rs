//! One physical connection: dial, read loop, writer actor, keepalive.
//!
//! A session owns its transport from dial to close. The read loop runs on the
//! session task; the writer actor and keepalive monitor are spawned per
//! session under a child cancellation token and are always awaited (or
//! aborted) before the session returns.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use signlink_core::{Dispatched, Dispatcher};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, instrument, trace, warn};
use url::Url;

use crate::config::{ClientConfig, KeepaliveConfig};
use crate::endpoint::{is_secure, resolve_endpoint};
use crate::errors::SessionError;
use crate::keepalive::{KeepaliveResult, run_keepalive};
use crate::tls::TlsPolicy;
use crate::writer::{OUTBOUND_CAPACITY, WriterHandle, run_writer};

/// How long teardown waits for the writer to flush its close frame.
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Client WebSocket over plain TCP or rustls.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Per-session connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Dialing.
    Connecting,
    /// Handshake complete; reading frames.
    Open,
    /// Tearing down the writer and keepalive.
    Closing,
    /// Transport closed.
    Closed,
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server closed the connection.
    ClosedByPeer,
    /// Shutdown was requested.
    Cancelled,
}

/// Dials the configured endpoint and runs one connection at a time.
pub struct Session {
    config: Arc<ClientConfig>,
    dispatcher: Arc<Dispatcher>,
    state: watch::Sender<ConnectionState>,
}

impl Session {
    /// Create a session runner for `config`, dispatching through `dispatcher`.
    pub fn new(config: Arc<ClientConfig>, dispatcher: Arc<Dispatcher>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Closed);
        Self {
            config,
            dispatcher,
            state,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Dial the endpoint and read until the connection ends.
    #[instrument(skip_all, fields(client_id = %self.config.client_id, connection_id = tracing::field::Empty))]
    pub async fn connect_and_listen(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, SessionError> {
        let url = resolve_endpoint(
            &self.config.url,
            &self.config.client_type,
            &self.config.client_id,
        )?;

        transition(&self.state, ConnectionState::Connecting);
        let ws = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                transition(&self.state, ConnectionState::Closed);
                return Ok(SessionEnd::Cancelled);
            }
            dialed = dial(&url, self.config.tls, self.config.connect_timeout) => dialed,
        };
        let ws = match ws {
            Ok(ws) => ws,
            Err(e) => {
                transition(&self.state, ConnectionState::Closed);
                return Err(e);
            }
        };

        run_connection(ws, &self.dispatcher, self.config.keepalive, &self.state, cancel).await
    }
}

/// Open a WebSocket to `url` within `timeout`.
///
/// `wss` endpoints use a rustls connector built from `tls`.
pub async fn dial(url: &Url, tls: TlsPolicy, timeout: Duration) -> Result<WsStream, SessionError> {
    let connector = if is_secure(url) {
        if tls.is_insecure() {
            warn!(url = %url, "certificate verification disabled for this connection");
        }
        Some(tls.connector()?)
    } else {
        None
    };

    debug!(url = %url, "dialing");
    let connect = connect_async_tls_with_config(url.as_str(), None, false, connector);
    #[allow(clippy::cast_possible_truncation)]
    let timeout_ms = timeout.as_millis() as u64;
    let (ws, response) = time::timeout(timeout, connect)
        .await
        .map_err(|_| SessionError::ConnectTimeout { timeout_ms })?
        .map_err(SessionError::Connect)?;
    debug!(status = %response.status(), "handshake complete");
    Ok(ws)
}

enum Stop {
    Shutdown,
    PeerClosed,
    ReadFailed(tokio_tungstenite::tungstenite::Error),
    SessionCancelled,
}

/// Run the read loop over an established WebSocket until it ends.
///
/// Spawns the writer actor and keepalive monitor, dispatches inbound frames
/// in arrival order, and tears everything down before returning. The
/// transport is closed exactly once, by the writer.
pub async fn run_connection<S>(
    ws: WebSocketStream<S>,
    dispatcher: &Dispatcher,
    keepalive: KeepaliveConfig,
    state: &watch::Sender<ConnectionState>,
    cancel: &CancellationToken,
) -> Result<SessionEnd, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, mut stream) = ws.split();
    let session_cancel = cancel.child_token();
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let writer = WriterHandle::new(tx);
    let mut writer_task = tokio::spawn(run_writer(sink, rx, session_cancel.clone()));
    let keepalive_task = tokio::spawn(run_keepalive(
        writer.clone(),
        keepalive.interval,
        keepalive.probe_timeout,
        session_cancel.clone(),
    ));

    transition(state, ConnectionState::Open);
    info!("connection open");
    let mut last_seen = Instant::now();

    let stop = loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => break Stop::Shutdown,
            () = session_cancel.cancelled() => break Stop::SessionCancelled,
            frame = stream.next() => frame,
        };

        let message = match frame {
            None => break Stop::PeerClosed,
            Some(Err(e)) => break Stop::ReadFailed(e),
            Some(Ok(message)) => message,
        };
        last_seen = Instant::now();

        if let Message::Close(frame) = &message {
            info!(frame = ?frame, "server closed connection");
            break Stop::PeerClosed;
        }
        // a reply can wait on a full outbound queue
        tokio::select! {
            biased;
            () = cancel.cancelled() => break Stop::Shutdown,
            () = session_cancel.cancelled() => break Stop::SessionCancelled,
            () = handle_message(dispatcher, &writer, message) => {}
        }
    };

    transition(state, ConnectionState::Closing);
    if time::timeout(WRITER_GRACE, writer.close()).await.is_err() {
        debug!("close request not queued, cancelling writer");
    }
    session_cancel.cancel();

    let keepalive_result = keepalive_task.await.unwrap_or_else(|e| {
        warn!(error = %e, "keepalive task failed");
        KeepaliveResult::Cancelled
    });
    match time::timeout(WRITER_GRACE, &mut writer_task).await {
        Ok(Ok(exit)) => debug!(?exit, "writer finished"),
        Ok(Err(e)) => warn!(error = %e, "writer task failed"),
        Err(_) => {
            writer_task.abort();
            warn!("writer did not stop in time, aborted");
        }
    }
    drop(stream);
    transition(state, ConnectionState::Closed);

    #[allow(clippy::cast_possible_truncation)]
    let idle_ms = last_seen.elapsed().as_millis() as u64;
    match stop {
        Stop::Shutdown => {
            info!("connection closed for shutdown");
            Ok(SessionEnd::Cancelled)
        }
        Stop::PeerClosed => {
            info!(idle_ms, "connection closed by server");
            Ok(SessionEnd::ClosedByPeer)
        }
        Stop::ReadFailed(e) => Err(SessionError::Read(e)),
        Stop::SessionCancelled if keepalive_result == KeepaliveResult::Failed => {
            Err(SessionError::KeepaliveFailed)
        }
        Stop::SessionCancelled => Err(SessionError::WriterClosed),
    }
}

async fn handle_message(dispatcher: &Dispatcher, writer: &WriterHandle, message: Message) {
    match message {
        Message::Text(text) => handle_frame(dispatcher, writer, text.as_bytes()).await,
        Message::Binary(bytes) => {
            if std::str::from_utf8(&bytes).is_ok() {
                handle_frame(dispatcher, writer, &bytes).await;
            } else {
                warn!(len = bytes.len(), "skipping non-UTF-8 binary frame");
            }
        }
        Message::Ping(_) => trace!("ping received"),
        Message::Pong(_) => trace!("pong received"),
        Message::Close(_) | Message::Frame(_) => {}
    }
}

async fn handle_frame(dispatcher: &Dispatcher, writer: &WriterHandle, frame: &[u8]) {
    match dispatcher.dispatch_frame(frame).await {
        Dispatched::Reply(reply) => {
            if let Err(e) = writer.send_envelope(&reply).await {
                warn!(error = %e, operation = %reply.operation_type, "reply not sent");
            }
        }
        Dispatched::Connected(info) => {
            let _ = Span::current().record("connection_id", info.connection_id.as_str());
        }
        _ => {}
    }
}

fn transition(state: &watch::Sender<ConnectionState>, to: ConnectionState) {
    let from = state.send_replace(to);
    debug!(?from, ?to, "connection state");
}
