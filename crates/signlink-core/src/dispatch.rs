//! Envelope dispatch: discriminator → handler → optional reply.
//!
//! Nothing in here is fatal to a connection. Malformed frames, payloads that
//! do not match their discriminator, unknown discriminators and signer
//! failures are all logged and reported as a [`Dispatched`] outcome so the
//! read loop can carry on with the next frame.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::envelope::{Envelope, decode_envelope};
use crate::errors::{CodecError, SignError};
use crate::message::{InboundMessage, OP_FULL_SIG, SchemaProfile};
use crate::payload::{ConnectionInfo, PairingPayload, SignNotice, SignRequest};
use crate::signer::Signer;

/// What dispatching one inbound envelope produced.
#[derive(Debug)]
pub enum Dispatched {
    /// Send this envelope back on the same session.
    Reply(Envelope),
    /// A device pairing was announced.
    Paired(PairingPayload),
    /// A signing notice was received.
    Noticed(SignNotice),
    /// The coordinator assigned a connection id.
    Connected(ConnectionInfo),
    /// Discriminator not recognized; dropped.
    Ignored {
        /// The unrecognized discriminator.
        operation: String,
    },
    /// The frame or its payload could not be decoded; dropped.
    Rejected(CodecError),
    /// The signer failed; no reply sent.
    Failed(SignError),
}

impl Dispatched {
    /// Outbound envelope to send, if any.
    pub fn reply(&self) -> Option<&Envelope> {
        match self {
            Self::Reply(envelope) => Some(envelope),
            _ => None,
        }
    }

    /// Take the outbound envelope, if any.
    pub fn into_reply(self) -> Option<Envelope> {
        match self {
            Self::Reply(envelope) => Some(envelope),
            _ => None,
        }
    }
}

/// Routes inbound envelopes to their handlers.
pub struct Dispatcher {
    client_id: String,
    profile: SchemaProfile,
    signer: Arc<dyn Signer>,
}

impl Dispatcher {
    /// Create a dispatcher replying as `client_id` under `profile`.
    pub fn new(client_id: impl Into<String>, profile: SchemaProfile, signer: Arc<dyn Signer>) -> Self {
        Self {
            client_id: client_id.into(),
            profile,
            signer,
        }
    }

    /// Client id used as `sourceId` on replies.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Active schema profile.
    pub fn profile(&self) -> SchemaProfile {
        self.profile
    }

    /// Decode a raw frame and dispatch it.
    pub async fn dispatch_frame(&self, frame: &[u8]) -> Dispatched {
        match decode_envelope(frame) {
            Ok(envelope) => self.dispatch(&envelope).await,
            Err(error) => {
                warn!(error = %error, len = frame.len(), "dropping undecodable frame");
                Dispatched::Rejected(error)
            }
        }
    }

    /// Dispatch a decoded envelope.
    #[instrument(skip_all, fields(operation = %envelope.operation_type))]
    pub async fn dispatch(&self, envelope: &Envelope) -> Dispatched {
        let message = match InboundMessage::classify(envelope, self.profile) {
            Ok(message) => message,
            Err(error) => {
                warn!(error = %error, "dropping message with undecodable payload");
                return Dispatched::Rejected(error);
            }
        };

        match message {
            InboundMessage::Pairing(pairing) => {
                info!(device_id = %pairing.device_id, user = %pairing.user, "device paired");
                Dispatched::Paired(pairing)
            }
            InboundMessage::SignRequest(request) => self.complete_signature(&request).await,
            InboundMessage::SignNotice(notice) => {
                info!(tx_id = %notice.tx_id, "signing notice received");
                Dispatched::Noticed(notice)
            }
            InboundMessage::ConnectionInfo(connection) => {
                info!(connection_id = %connection.connection_id, "connection id assigned");
                Dispatched::Connected(connection)
            }
            InboundMessage::Unknown(operation) => {
                debug!(operation, "unknown operation type, dropping");
                Dispatched::Ignored { operation }
            }
        }
    }

    async fn complete_signature(&self, request: &SignRequest) -> Dispatched {
        debug!(
            transaction_id = %request.transaction_id,
            team_id = %request.team_id,
            "signing input received"
        );
        let full = match self.signer.sign(request).await {
            Ok(full) => full,
            Err(error) => {
                warn!(error = %error, transaction_id = %request.transaction_id, "signer failed, no reply sent");
                return Dispatched::Failed(error);
            }
        };
        match Envelope::outbound(OP_FULL_SIG, &self.client_id, &full) {
            Ok(reply) => {
                info!(transaction_id = %full.transaction_id, "full signature composed");
                Dispatched::Reply(reply)
            }
            Err(error) => {
                warn!(error = %error, "failed to encode full signature");
                Dispatched::Rejected(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::json;
    use tracing::Level;

    use crate::envelope::{decode_payload, encode_envelope};
    use crate::logging::capture_logs;
    use crate::payload::FullSigResponse;
    use crate::signer::PlaceholderSigner;

    fn dispatcher(profile: SchemaProfile) -> Dispatcher {
        Dispatcher::new("cli123", profile, Arc::new(PlaceholderSigner))
    }

    fn frame(value: &serde_json::Value) -> Vec<u8> {
        value.to_string().into_bytes()
    }

    fn sign_request_frame(operation: &str) -> Vec<u8> {
        frame(&json!({
            "action": "sendClient",
            "operationType": operation,
            "message": {
                "accountHash": "0xabc",
                "teamId": "team-1",
                "transactionId": "tx-1",
                "partialSig": "ps",
            },
        }))
    }

    struct FailingSigner;

    #[async_trait]
    impl Signer for FailingSigner {
        async fn sign(&self, request: &SignRequest) -> Result<FullSigResponse, SignError> {
            Err(SignError::Rejected {
                transaction_id: request.transaction_id.clone(),
                reason: "share mismatch".into(),
            })
        }
    }

    #[tokio::test]
    async fn sign_request_produces_one_full_sig() {
        let d = dispatcher(SchemaProfile::Signing);
        let outcome = d.dispatch_frame(&sign_request_frame("signing")).await;
        let reply = outcome.into_reply().expect("reply expected");

        assert_eq!(reply.operation_type, "FullSig");
        assert_eq!(reply.action.as_deref(), Some("sendServer"));
        assert_eq!(reply.source_id.as_deref(), Some("cli123"));
        let full: FullSigResponse = decode_payload(&reply).unwrap();
        assert_eq!(full.transaction_id, "tx-1");
        assert_eq!(full.team_id, "team-1");
        assert_eq!(full.account_hash, "0xabc");
    }

    #[tokio::test]
    async fn partial_sig_profile_replies_on_partial_sig() {
        let d = dispatcher(SchemaProfile::PartialSig);
        let outcome = d.dispatch_frame(&sign_request_frame("PartialSig")).await;
        let reply = outcome.reply().expect("reply expected");
        let wire: serde_json::Value =
            serde_json::from_str(&encode_envelope(reply).unwrap()).unwrap();
        assert_eq!(wire["message"]["signatureR"], "r");
        assert_eq!(wire["message"]["signatureS"], "s");
        assert_eq!(wire["message"]["signatureV"], "v");
    }

    #[tokio::test]
    async fn pairing_announces_without_reply() {
        let (logs, _guard) = capture_logs();
        let d = dispatcher(SchemaProfile::default());
        let outcome = d
            .dispatch_frame(&frame(&json!({
                "operationType": "pairing",
                "message": {"deviceId": "d1", "user": "u1"},
            })))
            .await;

        assert!(outcome.reply().is_none());
        assert_matches!(&outcome, Dispatched::Paired(p) if p.device_id == "d1" && p.user == "u1");
        let paired = logs.matching("device paired");
        assert_eq!(paired.len(), 1);
        assert_eq!(paired[0].field("device_id"), Some("d1"));
        assert_eq!(paired[0].field("user"), Some("u1"));
    }

    #[tokio::test]
    async fn unknown_operation_is_ignored_quietly() {
        let (logs, _guard) = capture_logs();
        let d = dispatcher(SchemaProfile::default());
        let outcome = d
            .dispatch_frame(&frame(&json!({"operationType": "rotateKeys", "message": {}})))
            .await;

        assert_matches!(&outcome, Dispatched::Ignored { operation } if operation == "rotateKeys");
        assert!(outcome.reply().is_none());
        assert!(logs.has_event(Level::DEBUG, "unknown operation type"));
        assert_eq!(logs.count_at_level(Level::WARN), 0);
        assert_eq!(logs.count_at_level(Level::INFO), 0);
    }

    #[tokio::test]
    async fn malformed_frames_are_rejected_not_fatal() {
        let d = dispatcher(SchemaProfile::default());
        let frames: Vec<Vec<u8>> = vec![
            b"".to_vec(),
            b"null".to_vec(),
            b"{{{".to_vec(),
            vec![0xff, 0x00, 0x13],
            b"{\"operationType\": 42}".to_vec(),
            frame(&json!({"operationType": "pairing", "message": {"deviceId": 7}})),
            frame(&json!({"operationType": "PartialSig", "message": "not json"})),
            frame(&json!({"operationType": "PartialSig"})),
        ];
        for f in &frames {
            let outcome = d.dispatch_frame(f).await;
            assert_matches!(outcome, Dispatched::Rejected(_));
        }
        // Still usable afterwards.
        let outcome = d.dispatch_frame(&sign_request_frame("PartialSig")).await;
        assert!(outcome.reply().is_some());
    }

    #[tokio::test]
    async fn notice_profile_has_no_reply() {
        let d = dispatcher(SchemaProfile::SigningNotice);
        let outcome = d
            .dispatch_frame(&frame(&json!({
                "operationType": "signing",
                "message": {"txId": "tx-9", "signature": "0xsig"},
            })))
            .await;
        assert_matches!(&outcome, Dispatched::Noticed(n) if n.tx_id == "tx-9");
        assert!(outcome.reply().is_none());
    }

    #[tokio::test]
    async fn signer_failure_sends_nothing() {
        let (logs, _guard) = capture_logs();
        let d = Dispatcher::new("cli123", SchemaProfile::PartialSig, Arc::new(FailingSigner));
        let outcome = d.dispatch_frame(&sign_request_frame("PartialSig")).await;
        assert_matches!(outcome, Dispatched::Failed(SignError::Rejected { .. }));
        assert!(logs.has_event(Level::WARN, "signer failed"));
    }

    #[tokio::test]
    async fn connection_info_is_recorded() {
        let d = dispatcher(SchemaProfile::default());
        let outcome = d
            .dispatch_frame(&frame(&json!({
                "operationType": "connectionInfo",
                "connectionId": "Zx1=",
            })))
            .await;
        assert_matches!(outcome, Dispatched::Connected(c) if c.connection_id == "Zx1=");
    }

    #[test]
    fn accessors() {
        let d = dispatcher(SchemaProfile::Signing);
        assert_eq!(d.client_id(), "cli123");
        assert_eq!(d.profile(), SchemaProfile::Signing);
    }
}
