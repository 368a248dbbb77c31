//! Typed shapes of the JSON-RPC responses the client consumes
//!
//! The `{ context, value }` envelope, blockhash, fee, simulation and account
//! payloads are the node's own types from `solana-rpc-client-api` and
//! `solana-account-decoder`. Signature statuses are kept local: the
//! execution error must reach callers as the node's JSON, untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use solana_account_decoder::UiAccount;
pub use solana_rpc_client_api::response::{
    Response, RpcBlockhash, RpcFeeCalculator, RpcResponseContext, RpcSimulateTransactionResult,
};
pub use solana_sdk::{account::Account, fee_calculator::FeeCalculator};

/// Cluster-reported confirmation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Processed,
    Confirmed,
    Finalized,
}

/// Status of one signature
///
/// `confirmations` is `None` once the slot is rooted. A present `err` means
/// the transaction was included and failed during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<usize>,
    pub err: Option<Value>,
    #[serde(default)]
    pub confirmation_status: Option<ConfirmationStatus>,
}

impl SignatureStatus {
    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }

    /// Confirmation level, falling back to the confirmation count when the
    /// node omits `confirmationStatus`
    ///
    /// A slot with at least `finalized_depth` confirmations, or a rooted
    /// slot, counts as finalized.
    pub fn level(&self, finalized_depth: usize) -> ConfirmationStatus {
        let by_depth = match self.confirmations {
            None => ConfirmationStatus::Finalized,
            Some(n) if n >= finalized_depth => ConfirmationStatus::Finalized,
            Some(n) if n > 0 => ConfirmationStatus::Confirmed,
            Some(_) => ConfirmationStatus::Processed,
        };
        match self.confirmation_status {
            Some(reported) => reported.max(by_depth),
            None => by_depth,
        }
    }
}
