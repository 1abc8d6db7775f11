//! # signlink-core
//!
//! Wire vocabulary and message routing for the signlink client.
//!
//! - **Envelope codec**: outer message wrapper with a deferred inner payload
//! - **Payloads**: pairing, signing request/notice, full-signature response
//! - **Schema profiles**: which discriminator carries which signing schema
//! - **Inbound union**: [`InboundMessage`] keyed by `operationType`
//! - **Dispatch**: [`Dispatcher`] turning envelopes into side effects or replies
//! - **Signer seam**: [`Signer`] trait, with a placeholder implementation

#![deny(unsafe_code)]

pub mod dispatch;
pub mod envelope;
pub mod errors;
pub mod logging;
pub mod message;
pub mod payload;
pub mod signer;

pub use dispatch::{Dispatched, Dispatcher};
pub use envelope::{Envelope, decode_envelope, decode_payload, encode_envelope};
pub use errors::{CodecError, SignError};
pub use message::{InboundMessage, SchemaProfile};
pub use payload::{ConnectionInfo, FullSigResponse, PairingPayload, SignNotice, SignRequest};
pub use signer::{PlaceholderSigner, Signer};
