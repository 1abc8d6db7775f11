//! Inner payload schemas carried in [`Envelope::message`](crate::Envelope).

use serde::{Deserialize, Serialize};

/// Announces a new peer device pairing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingPayload {
    /// Paired device identifier.
    pub device_id: String,
    /// User the device belongs to.
    pub user: String,
}

/// Request to turn a partial signature into a full one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// Hash of the signing account.
    pub account_hash: String,
    /// Team that owns the account.
    pub team_id: String,
    /// Transaction being signed.
    pub transaction_id: String,
    /// Partial signature produced by the other party.
    pub partial_sig: String,
}

/// Signing notification; no reply is expected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignNotice {
    /// Transaction identifier.
    pub tx_id: String,
    /// Signature produced for the transaction.
    pub signature: String,
}

/// Full signature sent back for a [`SignRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSigResponse {
    /// Echoed from the request.
    pub transaction_id: String,
    /// Echoed from the request.
    pub team_id: String,
    /// Echoed from the request.
    pub account_hash: String,
    /// Signature `r` component.
    pub signature_r: String,
    /// Signature `s` component.
    pub signature_s: String,
    /// Recovery id `v`.
    pub signature_v: String,
}

/// Connection id assigned to this client by the coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Assigned connection identifier.
    pub connection_id: String,
}
