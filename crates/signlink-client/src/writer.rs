//! Single-writer actor owning the sink half of a session's WebSocket.
//!
//! Every outbound frame, replies and keepalive probes alike, goes through one
//! queue and is written whole by one task, so frames never interleave on the
//! wire. The sink is closed exactly once, when the actor exits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{Sink, SinkExt};
use signlink_core::{Envelope, encode_envelope};
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::SendError;

/// Outbound queue depth per session.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Upper bound on flushing the close frame when the actor exits.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// A request to the writer actor.
#[derive(Debug)]
pub enum Outbound {
    /// A text frame.
    Frame(String),
    /// A ping frame; `ack` reports the write result.
    Ping {
        /// Ping payload.
        payload: Vec<u8>,
        /// Completed once the ping is flushed or fails.
        ack: oneshot::Sender<Result<(), tungstenite::Error>>,
    },
    /// Close the transport and stop.
    Close,
}

/// Cloneable handle submitting frames to the writer actor.
#[derive(Clone, Debug)]
pub struct WriterHandle {
    tx: mpsc::Sender<Outbound>,
    close_requested: Arc<AtomicBool>,
}

impl WriterHandle {
    /// Wrap the sending side of the writer queue.
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            tx,
            close_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queue a text frame.
    pub async fn send_text(&self, text: String) -> Result<(), SendError> {
        self.tx
            .send(Outbound::Frame(text))
            .await
            .map_err(|_| SendError::Closed)
    }

    /// Serialize and queue an envelope.
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<(), SendError> {
        let text = encode_envelope(envelope)?;
        self.send_text(text).await
    }

    /// Queue a ping and wait until it has been written.
    pub async fn ping(&self, payload: Vec<u8>) -> Result<(), SendError> {
        let (ack, written) = oneshot::channel();
        self.tx
            .send(Outbound::Ping { payload, ack })
            .await
            .map_err(|_| SendError::Closed)?;
        match written.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SendError::Write(e)),
            Err(_) => Err(SendError::Closed),
        }
    }

    /// Ask the writer to close the transport. Only the first call does
    /// anything; later calls return immediately.
    pub async fn close(&self) {
        if self.close_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        // a gone writer has already closed the sink
        let _ = self.tx.send(Outbound::Close).await;
    }

    /// Whether the writer task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Why the writer actor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// `close()` was called.
    CloseRequested,
    /// Every handle was dropped.
    HandlesDropped,
    /// The session token was cancelled.
    Cancelled,
    /// A write failed; the transport is unusable.
    WriteFailed,
}

/// Run the writer actor until close, cancellation, or a write failure.
///
/// A write failure cancels `cancel` so the owning session unwinds.
/// Cancellation also interrupts a write that the transport is not draining.
pub async fn run_writer<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
) -> WriterExit
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let exit = loop {
        let request = tokio::select! {
            biased;
            () = cancel.cancelled() => break WriterExit::Cancelled,
            request = rx.recv() => request,
        };

        match request {
            Some(Outbound::Frame(text)) => {
                let written = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break WriterExit::Cancelled,
                    written = sink.send(Message::Text(text.into())) => written,
                };
                if let Err(e) = written {
                    warn!(error = %e, "frame write failed");
                    break WriterExit::WriteFailed;
                }
            }
            Some(Outbound::Ping { payload, ack }) => {
                // a cancelled ping drops `ack`, which the caller sees as closed
                let written = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break WriterExit::Cancelled,
                    written = sink.send(Message::Ping(payload.into())) => written,
                };
                match written {
                    Ok(()) => {
                        let _ = ack.send(Ok(()));
                    }
                    Err(e) => {
                        warn!(error = %e, "ping write failed");
                        let _ = ack.send(Err(e));
                        break WriterExit::WriteFailed;
                    }
                }
            }
            Some(Outbound::Close) => break WriterExit::CloseRequested,
            None => break WriterExit::HandlesDropped,
        }
    };

    rx.close();
    if exit == WriterExit::WriteFailed {
        cancel.cancel();
    } else {
        match time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "close frame not delivered"),
            Err(_) => debug!("transport not draining, close frame abandoned"),
        }
    }
    debug!(?exit, "writer stopped");
    exit
}
