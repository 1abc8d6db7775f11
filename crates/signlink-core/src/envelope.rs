//! Outer wire envelope and the two-stage decode.
//!
//! Frames are decoded in two steps. [`decode_envelope`] reads the outer object
//! and keeps `message` as unparsed JSON text. Only once the discriminator has
//! picked a target shape does [`decode_payload`] decode the inner payload.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::errors::CodecError;

/// Action the coordinator uses to route client replies to the server side.
pub const ACTION_SEND_SERVER: &str = "sendServer";

/// Outer message wrapper exchanged with the coordinator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Routing action (`sendServer` on replies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Identifier of the sending client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Coordinator-assigned connection identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// Coordinator routing table between CLI and MPC parties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_to_mpc: Option<BTreeMap<String, String>>,
    /// Discriminator selecting the payload shape.
    pub operation_type: String,
    /// Inner payload, left undecoded until the discriminator is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<RawValue>>,
}

impl Envelope {
    /// Create an envelope carrying only a discriminator.
    pub fn new(operation_type: impl Into<String>) -> Self {
        Self {
            action: None,
            source_id: None,
            connection_id: None,
            cli_to_mpc: None,
            operation_type: operation_type.into(),
            message: None,
        }
    }

    /// Build an outbound envelope from this client with an encoded payload.
    pub fn outbound<T: Serialize>(
        operation_type: impl Into<String>,
        source_id: impl Into<String>,
        payload: &T,
    ) -> Result<Self, CodecError> {
        let message = serde_json::value::to_raw_value(payload).map_err(CodecError::Encode)?;
        Ok(Self {
            action: Some(ACTION_SEND_SERVER.to_string()),
            source_id: Some(source_id.into()),
            message: Some(message),
            ..Self::new(operation_type)
        })
    }

    /// Raw payload text, if present.
    pub fn raw_message(&self) -> Option<&str> {
        self.message.as_deref().map(RawValue::get)
    }
}

/// Decode the outer envelope of a frame.
///
/// The inner payload is not touched beyond checking that it is valid JSON.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::MalformedEnvelope)
}

/// Decode an envelope's payload into the shape chosen by its discriminator.
///
/// Some gateways forward the payload double-encoded, as a JSON string whose
/// contents are the payload object. Such strings are unwrapped once.
pub fn decode_payload<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, CodecError> {
    let raw = envelope
        .raw_message()
        .ok_or_else(|| CodecError::MissingPayload {
            operation: envelope.operation_type.clone(),
        })?;
    let malformed = |source| CodecError::MalformedPayload {
        operation: envelope.operation_type.clone(),
        source,
    };

    if raw.trim_start().starts_with('"') {
        let inner: String = serde_json::from_str(raw).map_err(malformed)?;
        return serde_json::from_str(&inner).map_err(malformed);
    }
    serde_json::from_str(raw).map_err(malformed)
}

/// Serialize an envelope to the text sent on the wire.
pub fn encode_envelope(envelope: &Envelope) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(CodecError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    use crate::payload::PairingPayload;

    #[test]
    fn decodes_full_envelope() {
        let frame = br#"{
            "action": "sendClient",
            "sourceId": "mpc-1",
            "connectionId": "c-9",
            "cliToMpc": {"cli123": "mpc-1"},
            "operationType": "pairing",
            "message": {"deviceId": "d1", "user": "u1"}
        }"#;
        let env = decode_envelope(frame).unwrap();
        assert_eq!(env.operation_type, "pairing");
        assert_eq!(env.action.as_deref(), Some("sendClient"));
        assert_eq!(env.source_id.as_deref(), Some("mpc-1"));
        assert_eq!(env.connection_id.as_deref(), Some("c-9"));
        assert_eq!(env.cli_to_mpc.unwrap()["cli123"], "mpc-1");
    }

    #[test]
    fn payload_is_not_decoded_eagerly() {
        // Payload shape is wrong for every known type, the envelope still decodes.
        let env = decode_envelope(br#"{"operationType":"pairing","message":[1,2,3]}"#).unwrap();
        assert_eq!(env.raw_message(), Some("[1,2,3]"));
        assert_matches!(
            decode_payload::<PairingPayload>(&env),
            Err(CodecError::MalformedPayload { .. })
        );
    }

    #[test]
    fn missing_operation_type_is_malformed() {
        let result = decode_envelope(br#"{"message":{}}"#);
        assert_matches!(result, Err(CodecError::MalformedEnvelope(_)));
    }

    #[test]
    fn garbage_is_malformed() {
        for frame in [
            &b"not json"[..],
            &b""[..],
            &b"[1,2]"[..],
            &b"\xff\xfe"[..],
            &b"{\"operationType\":"[..],
        ] {
            assert_matches!(decode_envelope(frame), Err(CodecError::MalformedEnvelope(_)));
        }
    }

    #[test]
    fn null_message_is_missing_payload() {
        let env = decode_envelope(br#"{"operationType":"pairing","message":null}"#).unwrap();
        assert!(env.message.is_none());
        assert_matches!(
            decode_payload::<PairingPayload>(&env),
            Err(CodecError::MissingPayload { operation }) if operation == "pairing"
        );
    }

    #[test]
    fn double_encoded_payload_is_unwrapped() {
        let inner = json!({"deviceId": "d1", "user": "u1"}).to_string();
        let frame = json!({"operationType": "pairing", "message": inner}).to_string();
        let env = decode_envelope(frame.as_bytes()).unwrap();
        let payload: PairingPayload = decode_payload(&env).unwrap();
        assert_eq!(payload.device_id, "d1");
        assert_eq!(payload.user, "u1");
    }

    #[test]
    fn string_payload_that_is_not_json_is_malformed() {
        let env = decode_envelope(br#"{"operationType":"pairing","message":"hello"}"#).unwrap();
        assert_matches!(
            decode_payload::<PairingPayload>(&env),
            Err(CodecError::MalformedPayload { .. })
        );
    }

    #[test]
    fn outbound_envelope_shape() {
        let payload = PairingPayload {
            device_id: "d1".into(),
            user: "u1".into(),
        };
        let env = Envelope::outbound("FullSig", "cli123", &payload).unwrap();
        let wire: serde_json::Value =
            serde_json::from_str(&encode_envelope(&env).unwrap()).unwrap();
        assert_eq!(wire["action"], "sendServer");
        assert_eq!(wire["sourceId"], "cli123");
        assert_eq!(wire["operationType"], "FullSig");
        assert_eq!(wire["message"]["deviceId"], "d1");
        assert!(wire.get("connectionId").is_none());
        assert!(wire.get("cliToMpc").is_none());
    }
}
