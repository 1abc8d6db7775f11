//! Discriminator-keyed inbound messages and deployment schema profiles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::{Envelope, decode_payload};
use crate::errors::CodecError;
use crate::payload::{ConnectionInfo, PairingPayload, SignNotice, SignRequest};

/// Pairing announcement.
pub const OP_PAIRING: &str = "pairing";
/// Signing discriminator used by the `signing` and `signingNotice` profiles.
pub const OP_SIGNING: &str = "signing";
/// Signing discriminator used by the `partialSig` profile.
pub const OP_PARTIAL_SIG: &str = "PartialSig";
/// Outbound full-signature reply.
pub const OP_FULL_SIG: &str = "FullSig";
/// Coordinator-assigned connection id.
pub const OP_CONNECTION_INFO: &str = "connectionInfo";

/// Which shape a profile's signing discriminator carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningSchema {
    /// `{accountHash, teamId, transactionId, partialSig}`, answered with `FullSig`.
    Request,
    /// `{txId, signature}`, no reply.
    Notice,
}

/// Deployment profile mapping the signing discriminator to one schema.
///
/// Exactly one signing schema is active per deployment. Under a given profile
/// the other discriminator is not recognized and is dropped as unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaProfile {
    /// `PartialSig` carries sign requests.
    #[default]
    PartialSig,
    /// `signing` carries sign requests.
    Signing,
    /// `signing` carries sign notices.
    SigningNotice,
}

impl SchemaProfile {
    /// Discriminator that carries signing traffic under this profile.
    pub fn signing_operation(self) -> &'static str {
        match self {
            Self::PartialSig => OP_PARTIAL_SIG,
            Self::Signing | Self::SigningNotice => OP_SIGNING,
        }
    }

    /// Schema decoded for the signing discriminator.
    pub fn signing_schema(self) -> SigningSchema {
        match self {
            Self::PartialSig | Self::Signing => SigningSchema::Request,
            Self::SigningNotice => SigningSchema::Notice,
        }
    }

    /// Settings / CLI name of the profile.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PartialSig => "partialSig",
            Self::Signing => "signing",
            Self::SigningNotice => "signingNotice",
        }
    }
}

impl fmt::Display for SchemaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized schema profile name.
#[derive(Debug, Error)]
#[error("unknown schema profile '{0}' (expected partialSig, signing or signingNotice)")]
pub struct UnknownProfile(pub String);

impl FromStr for SchemaProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partialSig" => Ok(Self::PartialSig),
            "signing" => Ok(Self::Signing),
            "signingNotice" => Ok(Self::SigningNotice),
            other => Err(UnknownProfile(other.to_string())),
        }
    }
}

/// An inbound envelope with its payload decoded per discriminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    /// New peer device pairing.
    Pairing(PairingPayload),
    /// Partial signature to complete.
    SignRequest(SignRequest),
    /// Signing notification.
    SignNotice(SignNotice),
    /// Connection id assignment.
    ConnectionInfo(ConnectionInfo),
    /// Discriminator not known under the active profile.
    Unknown(String),
}

impl InboundMessage {
    /// Decode an envelope's payload into the variant its discriminator selects.
    ///
    /// Unknown discriminators are not an error; their payload is never read.
    pub fn classify(envelope: &Envelope, profile: SchemaProfile) -> Result<Self, CodecError> {
        let operation = envelope.operation_type.as_str();
        let message = match operation {
            OP_PAIRING => Self::Pairing(decode_payload(envelope)?),
            OP_CONNECTION_INFO => Self::ConnectionInfo(connection_info(envelope)?),
            op if op == profile.signing_operation() => match profile.signing_schema() {
                SigningSchema::Request => Self::SignRequest(decode_payload(envelope)?),
                SigningSchema::Notice => Self::SignNotice(decode_payload(envelope)?),
            },
            other => Self::Unknown(other.to_string()),
        };
        Ok(message)
    }

    /// Discriminator name for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::Pairing(_) => OP_PAIRING,
            Self::SignRequest(_) => "signRequest",
            Self::SignNotice(_) => "signNotice",
            Self::ConnectionInfo(_) => OP_CONNECTION_INFO,
            Self::Unknown(op) => op,
        }
    }
}

/// Connection info may arrive as a payload or only as the envelope's
/// top-level `connectionId`.
fn connection_info(envelope: &Envelope) -> Result<ConnectionInfo, CodecError> {
    if envelope.message.is_some() {
        return decode_payload(envelope);
    }
    envelope
        .connection_id
        .clone()
        .map(|connection_id| ConnectionInfo { connection_id })
        .ok_or_else(|| CodecError::MissingPayload {
            operation: envelope.operation_type.clone(),
        })
}
