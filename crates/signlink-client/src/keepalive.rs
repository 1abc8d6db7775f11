//! Keepalive probes that keep idle connections open past intermediary idle
//! timeouts and detect dead transports.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::writer::WriterHandle;

/// Payload of every probe.
pub const PROBE_PAYLOAD: &[u8] = b"ping";

/// Outcome of the keepalive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveResult {
    /// A probe could not be written in time; the session token was cancelled.
    Failed,
    /// The session was torn down.
    Cancelled,
}

/// Send a ping probe through `writer` every `interval`.
///
/// The first tick fires one full interval after start. Each probe must be
/// written within `probe_timeout`. On failure `cancel` is cancelled so the
/// session's read loop unwinds, and [`KeepaliveResult::Failed`] is returned.
pub async fn run_keepalive(
    writer: WriterHandle,
    interval: Duration,
    probe_timeout: Duration,
    cancel: CancellationToken,
) -> KeepaliveResult {
    let start = time::Instant::now() + interval;
    let mut ticker = time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut probes: u64 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return KeepaliveResult::Cancelled,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return KeepaliveResult::Cancelled,
            outcome = time::timeout(probe_timeout, writer.ping(PROBE_PAYLOAD.to_vec())) => outcome,
        };

        match outcome {
            Ok(Ok(())) => {
                probes += 1;
                debug!(probes, "keepalive probe sent");
            }
            Ok(Err(e)) => {
                warn!(error = %e, "keepalive probe failed");
                cancel.cancel();
                return KeepaliveResult::Failed;
            }
            Err(_) => {
                #[allow(clippy::cast_possible_truncation)]
                let timeout_ms = probe_timeout.as_millis() as u64;
                warn!(timeout_ms, "keepalive probe timed out");
                cancel.cancel();
                return KeepaliveResult::Failed;
            }
        }
    }
}
