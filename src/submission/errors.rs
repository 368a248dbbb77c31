use thiserror::Error;

use crate::nonce_manager::NonceError;
use crate::rpc_manager::RpcError;
use crate::tx_builder::TransactionBuilderError;

/// Errors that stop a submission before it reaches a terminal outcome
///
/// Ledger-level results (confirmed, failed, expired, timed out) are
/// reported as a `SubmissionOutcome`, not as an error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmissionError {
    /// The transaction could not be built, signed or serialized
    #[error("Failed to build transaction: {0}")]
    Build(#[from] TransactionBuilderError),

    /// A preparatory RPC call (such as fetching a blockhash) failed
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// The durable nonce account could not be used
    #[error("Nonce error: {0}")]
    Nonce(#[from] NonceError),

    /// The caller stopped waiting
    #[error("Submission cancelled")]
    Cancelled,
}

impl SubmissionError {
    pub fn category(&self) -> &'static str {
        match self {
            SubmissionError::Build(e) => e.category(),
            SubmissionError::Rpc(e) => e.category(),
            SubmissionError::Nonce(e) => e.category(),
            SubmissionError::Cancelled => "cancelled",
        }
    }
}
