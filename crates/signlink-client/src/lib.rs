//! # signlink-client
//!
//! Keeps one WebSocket session to the coordinator alive for the life of the
//! process.
//!
//! - **Lifecycle**: [`Supervisor`] redials after every session end, with a
//!   pluggable [`RetryPolicy`]
//! - **Session**: [`Session`] dials, reads frames in order, and dispatches them
//! - **Writer**: one actor per session owns the sink, so frames never interleave
//! - **Keepalive**: ping probes on a fixed interval with a write deadline
//! - **TLS**: verified by default; skipping verification needs the
//!   `insecure-tls` feature

#![deny(unsafe_code)]

pub mod config;
pub mod endpoint;
pub mod errors;
pub mod keepalive;
pub mod lifecycle;
pub mod session;
pub mod tls;
pub mod writer;

pub use config::{ClientConfig, KeepaliveConfig, ReconnectConfig};
pub use errors::{ConfigError, SendError, SessionError};
pub use keepalive::KeepaliveResult;
pub use lifecycle::{
    ExponentialBackoff, FixedDelay, RetryPolicy, SessionRunner, Supervisor, policy_for,
};
pub use session::{ConnectionState, Session, SessionEnd};
pub use tls::TlsPolicy;
pub use writer::WriterHandle;
