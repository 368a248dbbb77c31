use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::rpc_manager::RpcError;

/// Errors raised while fetching or interpreting a durable nonce account
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NonceError {
    /// RPC operation failed
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// The ledger has no account at this address
    #[error("Nonce account not found: {0}")]
    AccountNotFound(Pubkey),

    /// Account exists but is not owned by the system program
    #[error("Account {account} is owned by {owner}, not the system program")]
    InvalidOwner { account: Pubkey, owner: Pubkey },

    /// Account data does not decode as nonce state
    #[error("Invalid nonce account data for {account}: {message}")]
    InvalidAccountData { account: Pubkey, message: String },

    /// Account was allocated but never initialized as a nonce
    #[error("Nonce account {0} is not initialized")]
    Uninitialized(Pubkey),

    /// Stored authority differs from the one the caller intends to sign with
    #[error("Nonce account {account} is controlled by {actual}, not {expected}")]
    AuthorityMismatch {
        account: Pubkey,
        expected: Pubkey,
        actual: Pubkey,
    },
}

impl NonceError {
    /// Check if this error is transient and retryable
    pub fn is_transient(&self) -> bool {
        match self {
            NonceError::Rpc(e) => e.is_retryable(),
            NonceError::AccountNotFound(_)
            | NonceError::InvalidOwner { .. }
            | NonceError::InvalidAccountData { .. }
            | NonceError::Uninitialized(_)
            | NonceError::AuthorityMismatch { .. } => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            NonceError::Rpc(_) => "rpc",
            NonceError::AccountNotFound(_) => "not_found",
            NonceError::InvalidOwner { .. } => "invalid_owner",
            NonceError::InvalidAccountData { .. } => "invalid_data",
            NonceError::Uninitialized(_) => "uninitialized",
            NonceError::AuthorityMismatch { .. } => "authority_mismatch",
        }
    }
}

/// Result type for nonce operations
pub type NonceResult<T> = Result<T, NonceError>;
