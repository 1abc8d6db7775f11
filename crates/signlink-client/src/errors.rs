//! Client error types.

use signlink_core::CodecError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Configuration that cannot produce a working session.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The endpoint URL did not parse.
    #[error("invalid endpoint url '{url}': {source}")]
    InvalidUrl {
        /// The configured URL.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// The endpoint URL is not `ws` or `wss`.
    #[error("unsupported endpoint scheme '{scheme}' (expected ws or wss)")]
    UnsupportedScheme {
        /// The rejected scheme.
        scheme: String,
    },

    /// Insecure TLS was requested in a build without the `insecure-tls` feature.
    #[error("tls.allowInsecure requires a build with the insecure-tls feature")]
    InsecureTlsUnavailable,

    /// The rustls client configuration could not be built.
    #[error("tls configuration failed: {0}")]
    Tls(#[from] rustls::Error),

    /// A duration or size setting was zero or otherwise unusable.
    #[error("invalid client setting {name}: {reason}")]
    InvalidSetting {
        /// Setting key.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Why a connection session ended with an error.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session could not be configured.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The dial did not finish within the connect timeout.
    #[error("connect timed out after {timeout_ms}ms")]
    ConnectTimeout {
        /// How long we waited.
        timeout_ms: u64,
    },

    /// The WebSocket handshake failed.
    #[error("connect failed: {0}")]
    Connect(#[source] tungstenite::Error),

    /// Reading from the transport failed.
    #[error("read failed: {0}")]
    Read(#[source] tungstenite::Error),

    /// A keepalive probe could not be written in time.
    #[error("keepalive probe failed")]
    KeepaliveFailed,

    /// The writer task stopped while the session was still reading.
    #[error("writer closed")]
    WriterClosed,
}

impl SessionError {
    /// Whether the session had reached `Open` before failing.
    pub fn was_open(&self) -> bool {
        matches!(
            self,
            Self::Read(_) | Self::KeepaliveFailed | Self::WriterClosed
        )
    }
}

/// Failure to hand a frame to the writer.
#[derive(Debug, Error)]
pub enum SendError {
    /// The envelope could not be serialized.
    #[error(transparent)]
    Encode(#[from] CodecError),

    /// The writer task is gone.
    #[error("writer closed")]
    Closed,

    /// The writer reported a transport error for this frame.
    #[error("write failed: {0}")]
    Write(#[source] tungstenite::Error),
}
