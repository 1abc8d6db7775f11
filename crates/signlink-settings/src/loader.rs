//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SignlinkSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SIGNLINK_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use signlink_core::SchemaProfile;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{ReconnectStrategy, SignlinkSettings};

/// Resolve the path to the settings file (`~/.signlink/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".signlink").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SignlinkSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<SignlinkSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Read and merge the settings file without env overrides.
pub fn read_settings_file(path: &Path) -> Result<SignlinkSettings> {
    let defaults = serde_json::to_value(SignlinkSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut SignlinkSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Each variable has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are ignored with a warning (fall back to file/default)
pub fn apply_overrides<F>(settings: &mut SignlinkSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Endpoint ────────────────────────────────────────────────────
    if let Some(v) = env.string("SIGNLINK_URL") {
        settings.endpoint.url = v;
    }
    if let Some(v) = env.string("SIGNLINK_CLIENT_ID") {
        settings.endpoint.client_id = v;
    }
    if let Some(v) = env.string("SIGNLINK_CLIENT_TYPE") {
        settings.endpoint.client_type = v;
    }
    if let Some(v) = env.u64("SIGNLINK_CONNECT_TIMEOUT_MS", 100, 600_000) {
        settings.endpoint.connect_timeout_ms = v;
    }

    // ── TLS ─────────────────────────────────────────────────────────
    if let Some(v) = env.bool("SIGNLINK_ALLOW_INSECURE_TLS") {
        settings.tls.allow_insecure = v;
    }

    // ── Keepalive ───────────────────────────────────────────────────
    if let Some(v) = env.u64("SIGNLINK_KEEPALIVE_INTERVAL_MS", 1_000, 3_600_000) {
        settings.keepalive.interval_ms = v;
    }
    if let Some(v) = env.u64("SIGNLINK_PROBE_TIMEOUT_MS", 100, 600_000) {
        settings.keepalive.probe_timeout_ms = v;
    }

    // ── Reconnect ───────────────────────────────────────────────────
    if let Some(v) = env.u64("SIGNLINK_RECONNECT_DELAY_MS", 1, 3_600_000) {
        settings.reconnect.delay_ms = v;
    }

    // ── Schema / logging ────────────────────────────────────────────
    if let Some(v) = env.string("SIGNLINK_SCHEMA_PROFILE") {
        match v.parse::<SchemaProfile>() {
            Ok(profile) => settings.schema.profile = profile,
            Err(e) => warn!(key = "SIGNLINK_SCHEMA_PROFILE", error = %e, "ignoring env var"),
        }
    }
    if let Some(v) = env.string("SIGNLINK_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject settings the client cannot run with.
pub fn validate(settings: &SignlinkSettings) -> Result<()> {
    if settings.endpoint.url.trim().is_empty() {
        return Err(SettingsError::InvalidValue("endpoint.url is empty".into()));
    }
    if settings.endpoint.client_id.trim().is_empty() {
        return Err(SettingsError::InvalidValue("endpoint.clientId is empty".into()));
    }
    if settings.endpoint.connect_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "endpoint.connectTimeoutMs must be > 0".into(),
        ));
    }
    if settings.keepalive.interval_ms == 0 || settings.keepalive.probe_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "keepalive.intervalMs and keepalive.probeTimeoutMs must be > 0".into(),
        ));
    }
    if settings.reconnect.delay_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "reconnect.delayMs must be > 0".into(),
        ));
    }
    if settings.reconnect.strategy == ReconnectStrategy::Exponential
        && settings.reconnect.max_delay_ms < settings.reconnect.delay_ms
    {
        return Err(SettingsError::InvalidValue(
            "reconnect.maxDelayMs must be >= reconnect.delayMs".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
