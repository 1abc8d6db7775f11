//! Seam for the component that completes partial signatures.

use async_trait::async_trait;

use crate::errors::SignError;
use crate::payload::{FullSigResponse, SignRequest};

/// Produces a full signature from a coordinator's sign request.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Complete the partial signature in `request`.
    ///
    /// Implementations must echo `transaction_id`, `team_id` and
    /// `account_hash` unchanged.
    async fn sign(&self, request: &SignRequest) -> Result<FullSigResponse, SignError>;
}

/// Signer that answers every request with fixed `r`/`s`/`v` components.
///
/// Stands in until a real MPC backend is wired up.
#[derive(Clone, Debug, Default)]
pub struct PlaceholderSigner;

#[async_trait]
impl Signer for PlaceholderSigner {
    async fn sign(&self, request: &SignRequest) -> Result<FullSigResponse, SignError> {
        Ok(FullSigResponse {
            transaction_id: request.transaction_id.clone(),
            team_id: request.team_id.clone(),
            account_hash: request.account_hash.clone(),
            signature_r: "r".into(),
            signature_s: "s".into(),
            signature_v: "v".into(),
        })
    }
}
