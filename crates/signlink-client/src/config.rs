//! Runtime client configuration resolved from settings.

use std::time::Duration;

use signlink_settings::{ReconnectStrategy, SignlinkSettings};

use crate::errors::ConfigError;
use crate::tls::TlsPolicy;

/// Keepalive cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Time between probes.
    pub interval: Duration,
    /// Deadline for writing one probe.
    pub probe_timeout: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(240),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

/// Delay schedule between connection attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectConfig {
    /// Same delay every time.
    Fixed(Duration),
    /// Doubling delay from `base`, capped at `max`.
    Exponential {
        /// First delay.
        base: Duration,
        /// Upper bound.
        max: Duration,
    },
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::Fixed(Duration::from_secs(5))
    }
}

/// Everything a session and its supervisor need.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Endpoint URL before the identity query is attached.
    pub url: String,
    /// `type` query value.
    pub client_type: String,
    /// `cliId` query value and reply `sourceId`.
    pub client_id: String,
    /// Dial timeout.
    pub connect_timeout: Duration,
    /// Certificate policy for `wss` endpoints.
    pub tls: TlsPolicy,
    /// Keepalive cadence.
    pub keepalive: KeepaliveConfig,
    /// Reconnect delay schedule.
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Resolve settings into a client configuration.
    ///
    /// Fails on settings that could never produce a working session, such
    /// as zero durations or insecure TLS in a build without the feature.
    pub fn from_settings(settings: &SignlinkSettings) -> Result<Self, ConfigError> {
        let connect_timeout = positive_ms("endpoint.connectTimeoutMs", settings.endpoint.connect_timeout_ms)?;
        let keepalive = KeepaliveConfig {
            interval: positive_ms("keepalive.intervalMs", settings.keepalive.interval_ms)?,
            probe_timeout: positive_ms("keepalive.probeTimeoutMs", settings.keepalive.probe_timeout_ms)?,
        };
        let delay = positive_ms("reconnect.delayMs", settings.reconnect.delay_ms)?;
        let reconnect = match settings.reconnect.strategy {
            ReconnectStrategy::Fixed => ReconnectConfig::Fixed(delay),
            ReconnectStrategy::Exponential => {
                let max = positive_ms("reconnect.maxDelayMs", settings.reconnect.max_delay_ms)?;
                if max < delay {
                    return Err(ConfigError::InvalidSetting {
                        name: "reconnect.maxDelayMs",
                        reason: format!("{}ms is below delayMs {}ms", max.as_millis(), delay.as_millis()),
                    });
                }
                ReconnectConfig::Exponential { base: delay, max }
            }
        };

        Ok(Self {
            url: settings.endpoint.url.clone(),
            client_type: settings.endpoint.client_type.clone(),
            client_id: settings.endpoint.client_id.clone(),
            connect_timeout,
            tls: TlsPolicy::from_allow_insecure(settings.tls.allow_insecure)?,
            keepalive,
            reconnect,
        })
    }
}

fn positive_ms(name: &'static str, ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidSetting {
            name,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(ms))
}
