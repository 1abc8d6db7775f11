//! Codec and signing error types.

use thiserror::Error;

/// Errors from decoding or encoding wire envelopes.
///
/// None of these are fatal to a session: the read loop logs them and moves on
/// to the next frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame was not a valid envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The envelope has no `message` field but its operation needs one.
    #[error("missing payload for operation '{operation}'")]
    MissingPayload {
        /// The envelope's discriminator.
        operation: String,
    },

    /// The payload did not match the shape selected by the discriminator.
    #[error("malformed payload for operation '{operation}': {source}")]
    MalformedPayload {
        /// The envelope's discriminator.
        operation: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing an outbound envelope or payload failed.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CodecError {
    /// The discriminator this error relates to, if any.
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::MissingPayload { operation } | Self::MalformedPayload { operation, .. } => {
                Some(operation)
            }
            Self::MalformedEnvelope(_) | Self::Encode(_) => None,
        }
    }
}

/// Errors from producing a full signature.
#[derive(Debug, Error)]
pub enum SignError {
    /// The signer rejected the partial signature.
    #[error("signing rejected for transaction {transaction_id}: {reason}")]
    Rejected {
        /// Transaction the request referred to.
        transaction_id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The signer backend is not reachable.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
}
