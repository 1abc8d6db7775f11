//! Settings schema with compiled defaults.
//!
//! Every struct uses `#[serde(default)]` so a settings file only needs the
//! keys it overrides.

use serde::{Deserialize, Serialize};
use signlink_core::SchemaProfile;
use signlink_core::logging::LogFormat;

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignlinkSettings {
    /// Coordinator endpoint and client identity.
    pub endpoint: EndpointSettings,
    /// Certificate verification policy.
    pub tls: TlsSettings,
    /// Keepalive probe cadence.
    pub keepalive: KeepaliveSettings,
    /// Delay between reconnect attempts.
    pub reconnect: ReconnectSettings,
    /// Signing schema for this deployment.
    pub schema: SchemaSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Coordinator endpoint and client identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointSettings {
    /// WebSocket URL (`wss://` in production).
    pub url: String,
    /// Value of the `type` query parameter.
    pub client_type: String,
    /// Stable client identifier, sent as `cliId` and used as `sourceId`.
    pub client_id: String,
    /// Dial timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            url: "wss://127.0.0.1:8443/production".to_string(),
            client_type: "cli".to_string(),
            client_id: "cli123".to_string(),
            connect_timeout_ms: 30_000,
        }
    }
}

/// Certificate verification policy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsSettings {
    /// Skip certificate verification. Development only; honored only in
    /// builds with the `insecure-tls` feature.
    pub allow_insecure: bool,
}

/// Keepalive probe cadence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeepaliveSettings {
    /// Interval between probes in milliseconds.
    pub interval_ms: u64,
    /// Deadline for a single probe write in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for KeepaliveSettings {
    fn default() -> Self {
        // 4 minutes, inside the common 5 minute load balancer idle timeout.
        Self {
            interval_ms: 240_000,
            probe_timeout_ms: 10_000,
        }
    }
}

/// Reconnect strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStrategy {
    /// Same delay before every attempt.
    #[default]
    Fixed,
    /// Doubling delay capped at `maxDelayMs`.
    Exponential,
}

/// Delay between reconnect attempts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Strategy.
    pub strategy: ReconnectStrategy,
    /// Fixed delay, or base delay for exponential backoff, in milliseconds.
    pub delay_ms: u64,
    /// Cap for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::Fixed,
            delay_ms: 5_000,
            max_delay_ms: 60_000,
        }
    }
}

/// Signing schema for this deployment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaSettings {
    /// Schema profile.
    pub profile: SchemaProfile,
}

/// Log output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (`RUST_LOG` wins).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let s = SignlinkSettings::default();
        assert_eq!(s.endpoint.client_type, "cli");
        assert_eq!(s.endpoint.client_id, "cli123");
        assert_eq!(s.endpoint.connect_timeout_ms, 30_000);
        assert!(!s.tls.allow_insecure);
        assert_eq!(s.keepalive.interval_ms, 240_000);
        assert_eq!(s.keepalive.probe_timeout_ms, 10_000);
        assert_eq!(s.reconnect.strategy, ReconnectStrategy::Fixed);
        assert_eq!(s.reconnect.delay_ms, 5_000);
        assert_eq!(s.schema.profile, SchemaProfile::PartialSig);
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn camel_case_keys() {
        let value = serde_json::to_value(SignlinkSettings::default()).unwrap();
        assert!(value["endpoint"].get("clientId").is_some());
        assert!(value["endpoint"].get("connectTimeoutMs").is_some());
        assert!(value["tls"].get("allowInsecure").is_some());
        assert!(value["keepalive"].get("probeTimeoutMs").is_some());
        assert_eq!(value["reconnect"]["strategy"], "fixed");
        assert_eq!(value["schema"]["profile"], "partialSig");
        assert_eq!(value["logging"]["format"], "compact");
    }

    #[test]
    fn partial_object_fills_defaults() {
        let s: SignlinkSettings = serde_json::from_value(json!({
            "endpoint": {"clientId": "cli-9"},
            "reconnect": {"strategy": "exponential"},
        }))
        .unwrap();
        assert_eq!(s.endpoint.client_id, "cli-9");
        assert_eq!(s.endpoint.client_type, "cli");
        assert_eq!(s.reconnect.strategy, ReconnectStrategy::Exponential);
        assert_eq!(s.reconnect.delay_ms, 5_000);
    }

    #[test]
    fn unknown_profile_rejected() {
        let result = serde_json::from_value::<SignlinkSettings>(json!({
            "schema": {"profile": "both"},
        }));
        assert!(result.is_err());
    }
}
