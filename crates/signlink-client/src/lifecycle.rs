//! Reconnect supervisor: run sessions back to back for the process lifetime.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ReconnectConfig;
use crate::errors::SessionError;
use crate::session::{Session, SessionEnd};

/// Something that runs one connection to completion.
#[async_trait]
pub trait SessionRunner: Send + Sync {
    /// Connect, serve until the connection ends, and report why it ended.
    async fn run_session(&self, cancel: &CancellationToken) -> Result<SessionEnd, SessionError>;
}

#[async_trait]
impl SessionRunner for Session {
    async fn run_session(&self, cancel: &CancellationToken) -> Result<SessionEnd, SessionError> {
        self.connect_and_listen(cancel).await
    }
}

/// Delay schedule between connection attempts.
pub trait RetryPolicy: Send {
    /// Delay before the next attempt. `attempt` counts consecutive attempts
    /// since the last session that reached `Open`, starting at 0.
    fn next_delay(&mut self, attempt: u32) -> Duration;

    /// Called after a session that reached `Open` has ended.
    fn reset(&mut self) {}
}

/// Same delay before every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(Duration::from_secs(5))
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&mut self, _attempt: u32) -> Duration {
        self.0
    }
}

/// `base * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff starting at `base` and never exceeding `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.checked_mul(factor).map_or(self.max, |d| d.min(self.max))
    }
}

/// Retry policy for a reconnect configuration.
pub fn policy_for(config: ReconnectConfig) -> Box<dyn RetryPolicy> {
    match config {
        ReconnectConfig::Fixed(delay) => Box::new(FixedDelay(delay)),
        ReconnectConfig::Exponential { base, max } => Box::new(ExponentialBackoff::new(base, max)),
    }
}

/// Runs sessions one after another until shutdown.
pub struct Supervisor<R> {
    runner: R,
    policy: Box<dyn RetryPolicy>,
}

impl<R: SessionRunner> Supervisor<R> {
    /// Create a supervisor driving `runner` with `policy` between attempts.
    pub fn new(runner: R, policy: Box<dyn RetryPolicy>) -> Self {
        Self { runner, policy }
    }

    /// Reconnect forever. Returns only once `cancel` is cancelled.
    ///
    /// Every session end other than shutdown, orderly closes included, is
    /// followed by the policy's delay before the next dial.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut sessions: u64 = 0;
        let mut attempt: u32 = 0;

        loop {
            sessions += 1;
            info!(session = sessions, attempt, "connecting");
            let opened = match self.runner.run_session(&cancel).await {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::ClosedByPeer) => {
                    info!(session = sessions, "connection closed by server");
                    true
                }
                Err(e) => {
                    warn!(session = sessions, error = %e, "connection failed");
                    e.was_open()
                }
            };
            if cancel.is_cancelled() {
                break;
            }

            if opened {
                attempt = 0;
                self.policy.reset();
            }
            let delay = self.policy.next_delay(attempt);
            attempt = attempt.saturating_add(1);

            #[allow(clippy::cast_possible_truncation)]
            let delay_ms = delay.as_millis() as u64;
            info!(delay_ms, "reconnecting after delay");
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!(sessions, "supervisor stopped");
    }
}
